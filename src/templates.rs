//! Prebuilt window pages

use crate::settings::api_key_name;

/// Minimum key length the collector page accepts
const MIN_KEY_LEN: usize = 10;

/// Escape text for an HTML element or double-quoted attribute
pub fn html_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// JSON string literal that is also safe inside a `<script>` element
fn js_string(raw: &str) -> String {
    serde_json::Value::String(raw.to_string())
        .to_string()
        .replace("</", "<\\/")
}

/// Title of the collector window for `service_name`
pub fn api_key_collector_title(service_name: &str) -> String {
    format!("{} API Key Required", service_name)
}

/// Page asking the user for an API key.
///
/// On submit it sets `window.userResponse` to
/// `{"status": "success", "data": {"api_key": "..."}}` and closes; the
/// bridge stores the key, the page never does.
pub fn api_key_collector_html(service_name: &str, service_url: &str) -> String {
    let name = html_escape(service_name);
    let key_name = html_escape(&api_key_name(service_name));

    let link = if service_url.trim().is_empty() {
        String::new()
    } else {
        format!(
            r#"<p class="hint">Don't have one? <a href="{url}" target="_blank" rel="noopener">Get a {name} API key</a></p>"#,
            url = html_escape(service_url),
            name = name
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{name} API Key Required</title>
<style>
  body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 28px; background: #f5f5f7; color: #1d1d1f; }}
  .card {{ background: #fff; border-radius: 10px; padding: 28px; box-shadow: 0 2px 12px rgba(0,0,0,0.08); }}
  h2 {{ margin: 0 0 8px; font-size: 20px; }}
  p {{ margin: 0 0 14px; line-height: 1.45; }}
  code {{ background: #f0f0f3; padding: 1px 5px; border-radius: 4px; }}
  input {{ width: 100%; box-sizing: border-box; padding: 11px; font-size: 14px; border: 1px solid #ccc; border-radius: 6px; }}
  .actions {{ margin-top: 18px; display: flex; gap: 10px; }}
  button {{ padding: 10px 20px; border: none; border-radius: 6px; font-size: 14px; cursor: pointer; }}
  .primary {{ background: #007aff; color: #fff; }}
  .secondary {{ background: #e5e5ea; color: #1d1d1f; }}
  .error {{ color: #d70015; font-size: 13px; min-height: 18px; margin-top: 8px; }}
  .hint {{ font-size: 13px; color: #6e6e73; }}
</style>
</head>
<body>
<div class="card">
  <h2>{name} API Key Required</h2>
  <p>Enter your {name} API key. It will be stored securely as <code>{key_name}</code>.</p>
  {link}
  <input type="password" id="apiKey" placeholder="Paste your API key" autocomplete="off" autofocus>
  <div class="error" id="error"></div>
  <div class="actions">
    <button class="primary" id="submitBtn" onclick="submitKey()">Save &amp; Continue</button>
    <button class="secondary" onclick="cancel()">Cancel</button>
  </div>
</div>
<script>
  var serviceName = {service_js};
  function submitKey() {{
    var key = document.getElementById('apiKey').value.trim();
    var error = document.getElementById('error');
    if (!key) {{ error.textContent = 'Please enter an API key'; return; }}
    if (key.length < {min_len}) {{ error.textContent = 'API key appears to be too short'; return; }}
    window.userResponse = {{ status: 'success', data: {{ api_key: key, service: serviceName }} }};
    window.close();
  }}
  function cancel() {{
    window.userResponse = {{ status: 'cancelled', message: 'User cancelled API key entry' }};
    window.close();
  }}
  document.getElementById('apiKey').addEventListener('keydown', function (e) {{
    if (e.key === 'Enter') submitKey();
    if (e.key === 'Escape') cancel();
  }});
</script>
</body>
</html>
"#,
        name = name,
        key_name = key_name,
        link = link,
        service_js = js_string(service_name),
        min_len = MIN_KEY_LEN,
    )
}
