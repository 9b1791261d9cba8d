//! Server-rendered widget page.
//!
//! The page is plain HTML plus a small inline script that talks to the
//! widget API: it posts messages and repaints the streaming bubble from the
//! SSE events, routes link clicks to the copy endpoint, and writes returned
//! text to the browser clipboard.

use std::fmt::Write as _;

use crate::markdown::render_markdown;
use crate::widget::{HistoryState, Sender, WidgetSnapshot};

/// Display name of the bot.
pub const BOT_NAME: &str = "World Helper";

/// A titled group of links in the sources popup.
#[derive(Debug)]
pub struct LinkSection {
    pub title: &'static str,
    pub links: &'static [(&'static str, &'static str)],
}

/// Contents of the sources popup.
pub const SOURCES: &[LinkSection] = &[
    LinkSection {
        title: "World Links",
        links: &[
            ("World.org", "https://world.org/"),
            ("World Blog", "https://world.org/blog"),
            ("World FAQs", "https://world.org/faqs"),
            ("World Tech Tree", "https://world.org/tech-tree"),
            ("World White Paper", "https://whitepaper.world.org/"),
            ("Privacy", "https://world.org/privacy"),
            ("Terms of Service", "https://world.org/tos"),
        ],
    },
    LinkSection {
        title: "Social Platforms",
        links: &[
            ("Discord", "https://world.org/discord"),
            ("𝕏/Twitter", "https://x.com/worldcoin"),
            ("YouTube", "https://youtube.com/@worldcoinofficial"),
            ("Telegram", "https://t.me/worldcoin"),
            ("LinkedIn", "https://www.linkedin.com/company/worldcoinproject"),
        ],
    },
    LinkSection {
        title: "Useful Links",
        links: &[
            ("World ID", "https://world.org/world-id"),
            ("World App", "https://world.org/world-app"),
            ("World Chain", "https://world.org/world-chain"),
            ("World Chain Explorer", "https://worldchain-mainnet.explorer.alchemy.com/"),
            ("Find an Orb", "https://world.org/find-orb"),
            ("Help Center", "https://support.worldcoin.com/"),
            ("Partners", "https://world.org/partners"),
            ("Bug Bounties", "https://hackerone.com/toolsforhumanity"),
            ("Tools For Humanity", "https://www.toolsforhumanity.com/"),
            ("The World Foundation", "https://foundation.world.org/"),
        ],
    },
];

/// Paragraphs of the info popup.
pub const DISCLAIMER: &[&str] = &[
    "World Helper is an independent, community-driven project created to provide information and assistance.",
    "This application is not affiliated with, endorsed by, or officially connected to the World Foundation, Tools for Humanity, or any other organizations mentioned within the app. All product names, logos, brands, trademarks, and registered trademarks are the property of their respective owners.",
    "Any reference to third-party products, services, or organizations is for informational purposes only and does not constitute or imply endorsement, sponsorship, or recommendation. Information provided through this app is sourced from publicly available resources and is shared under fair use principles for educational and informational purposes only.",
];

/// Generate the HTML shell for the application.
fn html_shell(title: &str, widget_id: &str, busy: bool, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    <div class="chat-container" data-widget-id="{widget_id}" data-busy="{busy}">
        {content}
    </div>
    <script>{SCRIPT}</script>
</body>
</html>"#
    )
}

/// Render the full widget page for a snapshot.
#[must_use]
pub fn render_widget(snapshot: &WidgetSnapshot) -> String {
    let mut body = String::new();

    if snapshot.backdrop {
        body.push_str(r#"<div class="popup-backdrop" data-view="backdrop"></div>"#);
    }

    body.push_str(&render_header(snapshot));

    body.push_str(r#"<div class="messages-container" id="messages">"#);
    for (idx, message) in snapshot.messages.iter().enumerate() {
        let is_bot = message.sender == Sender::Bot;
        let sender = if is_bot { "bot" } else { "user" };
        let name = if is_bot { BOT_NAME } else { "You" };
        let _ = write!(
            body,
            r#"<div class="message-wrapper {sender}" data-index="{idx}"><div class="message-info"><span class="sender-name">{name}</span><span class="timestamp">{ts}</span></div><div class="message-bubble {sender}"><div class="markdown-content">{text}</div>"#,
            ts = html_escape(&message.timestamp),
            text = if is_bot {
                render_markdown(&message.text)
            } else {
                html_escape(&message.text)
            },
        );
        if is_bot {
            let copied = if snapshot.copied_message == Some(idx) {
                r#"<span class="copied-tooltip">Copied!</span>"#
            } else {
                ""
            };
            let _ = write!(
                body,
                r#"<button class="copy-button" data-copy="{idx}" aria-label="Copy message">{copied}Copy</button>"#
            );
        }
        body.push_str("</div></div>");
    }
    if snapshot.busy {
        body.push_str(&render_pending_reply(&snapshot.streaming_text));
    }
    body.push_str("</div>");

    let disabled = if snapshot.busy { " disabled" } else { "" };
    let _ = write!(
        body,
        r#"<form class="input-container" id="chat-form"><div class="input-wrapper"><input id="chat-input" class="message-input" type="text" name="message" placeholder="Type a message..." autocomplete="off"{disabled}><button type="submit" class="send-button"{disabled}>Send</button></div><p class="disclaimer">{BOT_NAME} may be wrong. Please double check the information.</p></form>"#
    );

    if let Some(notice) = &snapshot.link_notice {
        let _ = write!(
            body,
            r#"<div class="copy-notification">{}</div>"#,
            html_escape(notice)
        );
    }

    if snapshot.view.history_open() {
        body.push_str(&render_history(&snapshot.history));
    }

    html_shell(BOT_NAME, &html_escape(&snapshot.id), snapshot.busy, &body)
}

/// Bubble for the reply still streaming, or the typing indicator before its
/// first chunk.
fn render_pending_reply(streaming_text: &str) -> String {
    if streaming_text.is_empty() {
        return TYPING_INDICATOR.to_string();
    }
    format!(
        r#"<div class="message-wrapper bot streaming"><div class="message-info"><span class="sender-name">{BOT_NAME}</span></div><div class="message-bubble bot"><div class="markdown-content" data-length="{}">{}</div></div></div>"#,
        streaming_text.encode_utf16().count(),
        render_markdown(streaming_text)
    )
}

const TYPING_INDICATOR: &str = r#"<div class="message-wrapper bot typing" aria-label="Typing"><div class="message-bubble bot"><div class="typing-indicator"><span></span><span></span><span></span></div></div></div>"#;

fn render_header(snapshot: &WidgetSnapshot) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<header class="chat-header"><div class="header-content"><strong>{BOT_NAME}</strong></div><div class="header-buttons"><button class="info-button" data-view="history" aria-label="History">History</button><button class="info-button" data-view="sources" aria-label="Sources">Sources</button><button class="info-button" data-view="info" aria-label="Information">Info</button></div>"#
    );

    if snapshot.view.is_sources_open() {
        out.push_str(r#"<div class="info-popup sources-popup">"#);
        for section in SOURCES {
            let _ = write!(out, r#"<div class="sources-section"><h3>{}</h3><ul>"#, section.title);
            for (label, href) in section.links {
                let _ = write!(
                    out,
                    r#"<li><a href="{href}" target="_blank" rel="noopener noreferrer">{label}</a></li>"#
                );
            }
            out.push_str("</ul></div>");
        }
        out.push_str("</div>");
    }

    if snapshot.view.is_info_open() {
        out.push_str(r#"<div class="info-popup"><h3>Disclaimer</h3>"#);
        for paragraph in DISCLAIMER {
            let _ = write!(out, "<p>{paragraph}</p>");
        }
        out.push_str("</div>");
    }

    out.push_str("</header>");
    out
}

fn render_history(history: &HistoryState) -> String {
    let mut out = String::from(
        r#"<div class="conversations-panel"><div class="conversations-header"><h3>Conversation History</h3><button class="close-button" data-view="close-history">Close</button></div>"#,
    );

    match history {
        HistoryState::Idle | HistoryState::Loading => {
            out.push_str(r#"<div class="conversations-loading">Loading conversations...</div>"#);
        }
        HistoryState::Failed { error } => {
            let _ = write!(out, r#"<div class="conversations-error">{}</div>"#, html_escape(error));
        }
        HistoryState::Loaded { .. } => {
            out.push_str(r#"<div class="conversations-list">"#);
            for preview in history.previews() {
                let _ = write!(
                    out,
                    r#"<div class="conversation-item"><div class="conversation-header"><span class="conversation-date">{}</span><span class="conversation-source">{}</span></div><div class="conversation-messages">"#,
                    html_escape(&preview.date),
                    html_escape(&preview.source),
                );
                for msg in &preview.messages {
                    let _ = write!(
                        out,
                        r#"<div class="conversation-message {}">{}</div>"#,
                        html_escape(&msg.role),
                        html_escape(&msg.content),
                    );
                }
                if preview.more > 0 {
                    let _ = write!(
                        out,
                        r#"<div class="conversation-more">+{} more messages</div>"#,
                        preview.more
                    );
                }
                out.push_str("</div></div>");
            }
            out.push_str("</div>");
        }
    }

    out.push_str("</div>");
    out
}

/// Escape text for inclusion in HTML content and attribute values.
#[must_use]
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = r"
body { margin: 0; font-family: system-ui, sans-serif; background: #f5f5f5; }
.chat-container { display: flex; flex-direction: column; height: 100vh; max-width: 720px; margin: 0 auto; background: #fff; position: relative; }
.chat-header { display: flex; justify-content: space-between; align-items: center; padding: 12px 16px; border-bottom: 1px solid #eee; position: relative; }
.info-popup { position: absolute; top: 56px; right: 16px; z-index: 20; background: #fff; border: 1px solid #ddd; border-radius: 8px; padding: 12px 16px; max-width: 420px; max-height: 70vh; overflow-y: auto; }
.popup-backdrop { position: fixed; inset: 0; background: rgba(0,0,0,.3); z-index: 10; }
.messages-container { flex: 1; overflow-y: auto; padding: 16px; }
.message-wrapper { margin-bottom: 12px; }
.message-wrapper.user { text-align: right; }
.message-bubble { display: inline-block; padding: 8px 12px; border-radius: 12px; background: #eef; text-align: left; }
.message-bubble.user { background: #dfe; white-space: pre-wrap; }
.markdown-content p { margin: 0 0 6px; }
.message-info { font-size: 12px; color: #666; }
.timestamp { margin-left: 8px; }
.copy-button { margin-left: 8px; font-size: 11px; }
.input-container { padding: 12px 16px; border-top: 1px solid #eee; }
.input-wrapper { display: flex; gap: 8px; }
.message-input { flex: 1; padding: 8px; }
.disclaimer { font-size: 11px; color: #888; text-align: center; }
.copy-notification { position: fixed; bottom: 24px; left: 50%; transform: translateX(-50%); background: #333; color: #fff; padding: 6px 12px; border-radius: 6px; }
.conversations-panel { position: absolute; inset: 0; background: #fff; z-index: 30; overflow-y: auto; padding: 16px; }
.conversation-item { border-bottom: 1px solid #eee; padding: 8px 0; }
.typing-indicator span { display: inline-block; width: 6px; height: 6px; margin: 0 2px; border-radius: 50%; background: #99a; animation: blink 1.2s infinite; }
.typing-indicator span:nth-child(2) { animation-delay: .2s; }
.typing-indicator span:nth-child(3) { animation-delay: .4s; }
@keyframes blink { 0%, 80%, 100% { opacity: .2; } 40% { opacity: 1; } }
";

const SCRIPT: &str = r"
(() => {
  const root = document.querySelector('.chat-container');
  const api = `/api/widgets/${root.dataset.widgetId}`;
  const messages = document.getElementById('messages');
  const input = document.getElementById('chat-input');
  const form = document.getElementById('chat-form');

  const reload = () => window.location.replace(window.location.pathname + '?widget=' + root.dataset.widgetId);

  let bubble = null;
  let finished = false;
  const setBusy = (busy) => {
    input.disabled = busy;
    form.querySelector('button').disabled = busy;
    if (!busy) input.focus();
  };
  const clearPending = () => {
    document.querySelectorAll('#messages .typing, #messages .streaming').forEach((el) => el.remove());
    bubble = null;
  };
  const showTyping = () => {
    clearPending();
    const typing = document.createElement('div');
    typing.className = 'message-wrapper bot typing';
    typing.innerHTML = '<div class=\'message-bubble bot\'><div class=\'typing-indicator\'><span></span><span></span><span></span></div></div>';
    messages.appendChild(typing);
    messages.scrollTop = messages.scrollHeight;
  };

  const handle = (name, data) => {
    if (name === 'message.partial') {
      if (!bubble) {
        clearPending();
        bubble = document.createElement('div');
        bubble.className = 'message-wrapper bot streaming';
        bubble.innerHTML = '<div class=\'message-bubble bot\'><div class=\'markdown-content\'></div></div>';
        messages.appendChild(bubble);
      }
      bubble.querySelector('.markdown-content').innerHTML = data.html;
      messages.scrollTop = messages.scrollHeight;
    } else if (name === 'done') {
      finished = true;
      reload();
    }
  };

  form.addEventListener('submit', async (e) => {
    e.preventDefault();
    const text = input.value;
    if (!text.trim() || input.disabled) return;
    input.value = '';
    finished = false;
    setBusy(true);
    showTyping();
    try {
      const resp = await fetch(`${api}/messages`, {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ message: text }),
      });
      if (resp.status !== 200 || !resp.body) return;
      const reader = resp.body.getReader();
      const decoder = new TextDecoder();
      let buf = '';
      while (true) {
        const { value, done } = await reader.read();
        if (done) break;
        buf += decoder.decode(value, { stream: true });
        let pos;
        while ((pos = buf.indexOf('\n\n')) >= 0) {
          const frame = buf.slice(0, pos);
          buf = buf.slice(pos + 2);
          let name = 'message';
          let data = '';
          for (const line of frame.split('\n')) {
            if (line.startsWith('event: ')) name = line.slice(7);
            if (line.startsWith('data: ')) data += line.slice(6);
          }
          handle(name, data ? JSON.parse(data).data : null);
        }
      }
    } catch (err) {
      console.error(err);
    } finally {
      if (!finished) { clearPending(); setBusy(false); }
    }
  });

  document.addEventListener('click', async (e) => {
    const link = e.target.closest('.markdown-content a');
    if (link) {
      e.preventDefault();
      const resp = await fetch(`${api}/copy/link`, {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ url: link.getAttribute('href') || '' }),
      });
      const out = await resp.json();
      if (out.text) { try { await navigator.clipboard.writeText(out.text); } catch (err) { console.error(err); } }
      reload();
      return;
    }
    const copy = e.target.closest('[data-copy]');
    if (copy) {
      const resp = await fetch(`${api}/copy/messages/${copy.dataset.copy}`, { method: 'POST' });
      if (resp.ok) {
        const out = await resp.json();
        try { await navigator.clipboard.writeText(out.text); } catch (err) { console.error(err); }
        reload();
      }
      return;
    }
    const view = e.target.closest('[data-view]');
    let action = view ? view.dataset.view : null;
    const infoOpen = document.querySelector('.info-popup:not(.sources-popup)');
    if (!action && infoOpen && !e.target.closest('.info-popup')) action = 'dismiss-info';
    if (action) {
      await fetch(`${api}/view/${action}`, { method: 'POST' });
      reload();
    }
  });

  // Notifications are cleared server-side after a short delay.
  if (document.querySelector('.copy-notification, .copied-tooltip')) setTimeout(reload, 2100);

  // Rendered mid-exchange: the reply is streaming to another connection.
  if (root.dataset.busy === 'true') {
    const shown = root.querySelector('#messages .streaming .markdown-content');
    const seen = shown ? shown.dataset.length : '0';
    const timer = setInterval(async () => {
      try {
        const resp = await fetch(api);
        if (!resp.ok) { clearInterval(timer); return; }
        const snap = await resp.json();
        if (!snap.busy || String(snap.streaming_text.length) !== seen) {
          clearInterval(timer);
          reload();
        }
      } catch (err) {
        console.error(err);
      }
    }, 600);
  }

  input.focus();
})();
";
