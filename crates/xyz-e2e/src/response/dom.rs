// Page scripts used by the response probe
//
// Each script is a zero-argument arrow function so both backends can run it
// unchanged through `evaluate_script`.

use crate::error::Result;

/// Body text plus the number of elements matching `message_selector`.
///
/// Evaluates to `{ bodyText, messageCount }`.
pub fn snapshot_script(message_selector: &str) -> Result<String> {
    Ok(format!(
        "() => {{ \
           const body = document.body; \
           const bodyText = body ? (body.innerText || body.textContent || '') : ''; \
           return {{ bodyText, messageCount: document.querySelectorAll({}).length }}; \
         }}",
        serde_json::to_string(message_selector)?
    ))
}

/// Every element with non-empty text, with its bounding box and visibility.
///
/// Length filtering and ordering are left to the extractor so the script stays
/// free of tunables.
pub const TEXT_ELEMENTS_SCRIPT: &str = r#"() => {
  const out = [];
  for (const el of document.querySelectorAll('body *')) {
    const text = (el.textContent || el.innerText || '').trim();
    if (!text) continue;
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    out.push({
      text,
      tagName: el.tagName,
      top: rect.top,
      left: rect.left,
      width: rect.width,
      height: rect.height,
      visible: style.display !== 'none' && style.visibility !== 'hidden',
    });
  }
  return out;
}"#;

/// Clicks the innermost visible button whose label mentions signing in, or
/// else a visible submit button. Evaluates to a boolean.
pub const CLICK_SIGN_IN_SCRIPT: &str = r#"() => {
  const shown = (el) => {
    const style = window.getComputedStyle(el);
    return style.display !== 'none' && style.visibility !== 'hidden';
  };
  for (const btn of document.querySelectorAll('button')) {
    if (!shown(btn)) continue;
    const text = (btn.textContent || btn.innerText || '').trim().toLowerCase();
    if (text.includes('sign in') || text.includes('登录') || text.includes('log in')) {
      btn.click();
      return true;
    }
  }
  const submit = document.querySelector('button[type="submit"]');
  if (submit && shown(submit)) {
    submit.click();
    return true;
  }
  return false;
}"#;

/// Clicks the control rendered to the right of the email input, if any.
/// Evaluates to a boolean.
pub const CLICK_EMAIL_NEXT_SCRIPT: &str = r#"() => {
  const input = document.querySelector('input[type="email"], input[placeholder*="email" i], input');
  if (!input || !input.parentElement) return false;
  const inputRect = input.getBoundingClientRect();
  for (const btn of input.parentElement.querySelectorAll('button, [role="button"], svg, [class*="arrow" i]')) {
    const style = window.getComputedStyle(btn);
    if (style.display === 'none' || style.visibility === 'hidden') continue;
    const rect = btn.getBoundingClientRect();
    if (rect.left > inputRect.right - 50 && rect.top < inputRect.bottom && rect.bottom > inputRect.top) {
      btn.click();
      return true;
    }
  }
  return false;
}"#;

/// Current value of the first element matching `selector`, or null.
pub fn input_value_script(selector: &str) -> Result<String> {
    Ok(format!(
        "() => {{ const el = document.querySelector({}); return el && 'value' in el ? el.value : null; }}",
        serde_json::to_string(selector)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_script_embeds_selector_as_json() {
        let script = snapshot_script(r#"[class*="message"], [role="article"]"#).unwrap();
        assert!(script.starts_with("() =>"));
        assert!(script.contains(r#"querySelectorAll("[class*=\"message\"], [role=\"article\"]")"#));
    }
}
