//! Browser-side live reload client.
//!
//! The client listens for `buildComplete` events, re-checks the page and its
//! local scripts and stylesheets, and reacts according to the content-type
//! policy defined here.

use std::collections::BTreeMap;

use serde::Serialize;

/// Response headers compared between checks.
pub const TRACKED_HEADERS: [&str; 4] = ["Etag", "Last-Modified", "Content-Length", "Content-Type"];

const CONTENT_TYPES: [&str; 5] = [
    "text/css",
    "text/html",
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
];

/// What the client does when a resource changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Replace the `<link>` once the new sheet has loaded
    SwapStylesheet,
    /// Full page reload
    Reload,
    /// Full page reload, only when the resource is the open page
    ReloadIfCurrent,
    /// Do nothing
    Ignore,
}

/// Kind of a tracked resource, derived from its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Stylesheet,
    Script,
    Document,
    Other,
}

impl ResourceKind {
    /// Classify a `Content-Type` header value. Parameters are ignored.
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "text/css" => ResourceKind::Stylesheet,
            "text/javascript" | "application/javascript" | "application/x-javascript" => {
                ResourceKind::Script
            }
            "text/html" => ResourceKind::Document,
            _ => ResourceKind::Other,
        }
    }

    pub fn action(self) -> Action {
        match self {
            ResourceKind::Stylesheet => Action::SwapStylesheet,
            ResourceKind::Script => Action::Reload,
            ResourceKind::Document => Action::ReloadIfCurrent,
            ResourceKind::Other => Action::Ignore,
        }
    }
}

/// Content type to action table handed to the client.
pub fn policy() -> BTreeMap<&'static str, Action> {
    CONTENT_TYPES
        .iter()
        .map(|ct| (*ct, ResourceKind::from_content_type(ct).action()))
        .collect()
}

/// Client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// URL of the event stream
    pub events_url: String,

    /// Delay between checks for a swapped stylesheet having loaded
    pub swap_poll_ms: u64,

    /// Checks before giving up on a swap and reloading the page
    pub swap_max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            events_url: "/__live".to_string(),
            swap_poll_ms: 50,
            swap_max_attempts: 100,
        }
    }
}

/// Generate the client script.
pub fn client_script(config: &ClientConfig) -> String {
    let events_url = serde_json::Value::from(config.events_url.as_str()).to_string();
    let headers = serde_json::json!(TRACKED_HEADERS).to_string();
    let policy = serde_json::to_string(&policy()).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"
(function() {{
  'use strict';

  if (document.location.protocol === 'file:') {{
    console.log('[live] Live reload needs http, not file://');
    return;
  }}
  if (window.__mortarLive) {{
    return;
  }}
  window.__mortarLive = true;

  const EVENTS_URL = {events_url};
  const HEADERS = {headers};
  const POLICY = {policy};
  const SWAP_POLL_MS = {poll};
  const SWAP_MAX_ATTEMPTS = {attempts};
  const SELF_SRC = document.currentScript ? document.currentScript.getAttribute('src') : null;

  const resources = {{}};
  const inFlight = {{}};
  const links = {{}};
  let pageHash = null;
  let loaded = false;

  function hashCode(str) {{
    let hash = 0;
    for (let i = 0; i < str.length; i++) {{
      hash = (hash << 5) - hash + str.charCodeAt(i);
      hash |= 0;
    }}
    return hash;
  }}

  function isLocal(url) {{
    return new URL(url, document.location.href).origin === document.location.origin;
  }}

  async function pageFingerprint() {{
    try {{
      const response = await fetch(document.location.href, {{ cache: 'no-store' }});
      if (response.ok) {{
        return hashCode(await response.text());
      }}
    }} catch (e) {{
      console.error('[live] Page fetch failed:', e);
    }}
    return null;
  }}

  async function head(url) {{
    inFlight[url] = true;
    try {{
      const response = await fetch(url, {{ method: 'HEAD', cache: 'no-store' }});
      if (!response.ok) {{
        return null;
      }}
      const info = {{}};
      for (const name of HEADERS) {{
        let value = response.headers.get(name);
        if (value && name.toLowerCase() === 'etag') {{
          value = value.replace(/^W\//, '');
        }}
        if (value && name.toLowerCase() === 'content-type') {{
          value = value.split(';')[0].trim().toLowerCase();
        }}
        info[name] = value;
      }}
      return info;
    }} catch (e) {{
      console.error('[live] Fetch failed for ' + url + ':', e);
      return null;
    }} finally {{
      delete inFlight[url];
    }}
  }}

  function changed(before, after) {{
    for (const name of HEADERS) {{
      if (name.toLowerCase() === 'etag' && !after[name]) {{
        continue;
      }}
      if (before[name] !== after[name]) {{
        return true;
      }}
    }}
    return false;
  }}

  async function track() {{
    pageHash = await pageFingerprint();

    const urls = [];
    document.querySelectorAll('script[src]').forEach(function(script) {{
      const src = script.getAttribute('src');
      if (src !== SELF_SRC && isLocal(src)) {{
        urls.push(src);
      }}
    }});
    document.querySelectorAll('link[href]').forEach(function(link) {{
      const rel = link.getAttribute('rel') || '';
      const href = link.getAttribute('href');
      if (/stylesheet/i.test(rel) && isLocal(href)) {{
        urls.push(href);
        links[href] = link;
      }}
    }});

    await Promise.all(urls.map(async function(url) {{
      const info = await head(url);
      if (info) {{
        resources[url] = info;
      }}
    }}));

    const style = document.createElement('style');
    style.textContent = '.live-loading * {{ transition: all .3s ease-out; }}';
    document.head.appendChild(style);

    loaded = true;
  }}

  async function check() {{
    const hash = await pageFingerprint();
    if (hash !== null && pageHash !== null && hash !== pageHash) {{
      document.location.reload();
      return;
    }}

    Object.keys(resources).forEach(checkResource);
  }}

  async function checkResource(url) {{
    if (inFlight[url]) {{
      return;
    }}
    const info = await head(url);
    if (!info) {{
      return;
    }}
    const before = resources[url];
    resources[url] = info;
    if (changed(before, info)) {{
      refresh(url, info['Content-Type']);
    }}
  }}

  function refresh(url, contentType) {{
    switch (POLICY[(contentType || '').toLowerCase()] || 'ignore') {{
      case 'swap_stylesheet':
        swapStylesheet(url);
        break;
      case 'reload_if_current':
        if (new URL(url, document.location.href).href === document.location.href) {{
          document.location.reload();
        }}
        break;
      case 'reload':
        document.location.reload();
        break;
    }}
  }}

  function swapStylesheet(url) {{
    const old = links[url];
    if (!old) {{
      document.location.reload();
      return;
    }}

    const html = document.documentElement;
    html.classList.add('live-loading');

    const link = document.createElement('link');
    link.rel = 'stylesheet';
    link.href = url + (url.includes('?') ? '&' : '?') + 'now=' + Date.now();
    old.after(link);
    links[url] = link;

    let attempts = 0;
    (function poll() {{
      if (link.sheet) {{
        old.remove();
        setTimeout(function() {{
          html.classList.remove('live-loading');
        }}, 100);
        return;
      }}
      attempts++;
      if (attempts >= SWAP_MAX_ATTEMPTS) {{
        console.warn('[live] Stylesheet ' + url + ' did not load, reloading');
        document.location.reload();
        return;
      }}
      setTimeout(poll, SWAP_POLL_MS);
    }})();
  }}

  async function heartbeat() {{
    if (!document.body) {{
      return;
    }}
    if (!loaded) {{
      await track();
      return;
    }}
    await check();
  }}

  const source = new EventSource(EVENTS_URL);
  source.addEventListener('buildComplete', function() {{
    heartbeat();
  }});
  source.onerror = function(e) {{
    console.error('[live] Event stream error:', e);
  }};

  heartbeat();
}})();
"#,
        events_url = events_url,
        headers = headers,
        policy = policy,
        poll = config.swap_poll_ms,
        attempts = config.swap_max_attempts,
    )
}
