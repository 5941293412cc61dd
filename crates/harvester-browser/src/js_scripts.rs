//! Scripts evaluated in the Apollo search page
//!
//! Every script returns a value (never `null` or `undefined`) so results can be
//! deserialized directly. Scripts written as arrow functions are invoked
//! through [`call`] with JSON-encoded arguments.

use serde_json::Value;

/// Row container of the people results table
pub const ROW_CLASS: &str = "zp_Uiy0R";

/// Data cell inside a row
pub const CELL_CLASS: &str = "zp_egyXf";

/// Default selector of the "next page" control
pub const DEFAULT_NEXT_SELECTOR: &str = r#"button[aria-label="Next"]"#;

/// Snapshot every row as `[{cells: [{text, hrefs}]}]`
pub const ROWS_SCRIPT: &str = r#"
    (() => Array.from(document.getElementsByClassName('zp_Uiy0R')).map(row => ({
        cells: Array.from(row.getElementsByClassName('zp_egyXf')).map(cell => ({
            text: cell.textContent || '',
            hrefs: Array.from(cell.getElementsByTagName('a'))
                .map(a => (a.href || '').trim())
                .filter(href => href.length > 0)
        }))
    })))()
"#;

/// Text of the page-number indicator, empty if absent
pub const PAGE_NUMBER_SCRIPT: &str = r#"
    (() => {
        const xpath = '//*[@id="main-container-column-2"]/div/div/div/div[3]/div[2]/div[2]/div[2]/div/div[2]/div[1]/div[1]/span';
        let node = null;
        try {
            node = document.evaluate(xpath, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
        } catch (e) {}
        return { text: node ? (node.textContent || '') : '' };
    })()
"#;

/// `(selector) => bool`: control exists and is enabled
pub const NEXT_PRESENT_SCRIPT: &str = r#"
    (selector) => {
        const el = document.querySelector(selector);
        return !!el && !el.disabled && el.getAttribute('aria-disabled') !== 'true';
    }
"#;

/// `(selector) => bool`: click the control if it is still there
pub const NEXT_CLICK_SCRIPT: &str = r#"
    (selector) => {
        const el = document.querySelector(selector);
        if (!el || el.disabled) return false;
        el.click();
        return true;
    }
"#;

/// Shared helpers for challenge detection, installed once per document
const CHALLENGE_HELPERS: &str = r#"
    window.__harvesterChallengeVisible = window.__harvesterChallengeVisible || function () {
        const widgets = document.querySelectorAll('[id^="cf-chl-widget"]');
        for (const el of widgets) {
            const rect = el.getBoundingClientRect();
            const style = window.getComputedStyle(el);
            if (rect.width > 0 && rect.height > 0
                && style.display !== 'none'
                && style.visibility !== 'hidden'
                && parseFloat(style.opacity || '1') > 0) {
                return true;
            }
        }
        return false;
    };
"#;

/// `{accessDenied, challenge}` for the current document
pub fn block_status_script() -> String {
    format!(
        r#"
    (() => {{
        {CHALLENGE_HELPERS}
        let accessDenied = false;
        try {{
            const node = document.evaluate('/html/body/div[18]/div[2]/div/div', document, null,
                XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
            accessDenied = !!node && (node.textContent || '').toLowerCase().includes('access denied');
        }} catch (e) {{}}
        const challenge = window.__harvesterChallengeSeen === true || window.__harvesterChallengeVisible();
        return {{ accessDenied, challenge }};
    }})()
"#
    )
}

/// `(enabled) => bool`: arm or disarm the challenge observer.
///
/// While armed, any visible challenge widget latches `__harvesterChallengeSeen`
/// so a widget that flashes between polls is still reported.
pub fn watch_challenge_script() -> String {
    format!(
        r#"
    (enabled) => {{
        {CHALLENGE_HELPERS}
        if (window.__harvesterChallengeObserver) {{
            window.__harvesterChallengeObserver.disconnect();
            window.__harvesterChallengeObserver = null;
        }}
        window.__harvesterChallengeSeen = false;
        if (!enabled) return true;

        const check = () => {{
            if (window.__harvesterChallengeVisible()) {{
                window.__harvesterChallengeSeen = true;
            }}
        }};
        const observer = new MutationObserver(check);
        observer.observe(document.documentElement, {{
            childList: true, subtree: true, attributes: true,
            attributeFilter: ['style', 'class', 'id']
        }});
        window.__harvesterChallengeObserver = observer;
        check();
        return true;
    }}
"#
    )
}

/// `{present, value}` of the exclude-list text area (second match)
pub const EXCLUDE_READ_SCRIPT: &str = r#"
    (() => {
        const area = document.getElementsByClassName('zp-text-area zp_HnzhA zp_MLOFa zp_CALvp')[1];
        return { present: !!area, value: area ? (area.value || '') : '' };
    })()
"#;

/// `(text) => bool`: replace the exclude-list value and notify the page
pub const EXCLUDE_WRITE_SCRIPT: &str = r#"
    (text) => {
        const area = document.getElementsByClassName('zp-text-area zp_HnzhA zp_MLOFa zp_CALvp')[1];
        if (!area) return false;
        area.value = text;
        area.selectionStart = area.selectionEnd = area.value.length;
        area.dispatchEvent(new Event('input', { bubbles: true }));
        area.dispatchEvent(new Event('change', { bubbles: true }));
        return true;
    }
"#;

/// Click the exclude-list save button; false if it is missing
pub const EXCLUDE_SAVE_SCRIPT: &str = r#"
    (() => {
        const selector = '#main-container-column-2 > div > div > div.zp_ajhD0 > div.zp_p234g.people-finder-shell-container > div.zp_pxYrj > div.zp_FWOdG > div > div > div.zp_pDn5b.zp_T8qTB.zp_w3MDk > div.zp-accordion.zp_YkfVU.zp_UeG9f.zp_p8DhX > div.zp-accordion-body.zp_vJehh.zp_kTkJc > div.zp_S0sSP.zp_tIx8j.zp_th45Y.accordion-child-bleed > div.zp_G6R2_.subaccordion-body > div > div:nth-child(3) > div:nth-child(1) > div:nth-child(2) > button';
        const button = document.querySelector(selector);
        if (!button) return false;
        button.click();
        return true;
    })()
"#;

/// `(message) => bool`: show the "Scraping Stopped" modal unless already shown
pub const NOTICE_SCRIPT: &str = r#"
    (message) => {
        if (document.getElementById('ids-scrape-warning')) return true;

        const overlay = document.createElement('div');
        overlay.id = 'ids-scrape-warning';
        Object.assign(overlay.style, {
            position: 'fixed', inset: '0', background: 'rgba(0,0,0,0.45)',
            zIndex: '2147483647', display: 'flex', alignItems: 'center', justifyContent: 'center'
        });

        const panel = document.createElement('div');
        Object.assign(panel.style, {
            maxWidth: '680px', width: '90%', background: '#fff', border: '2px solid #f5c2c7',
            borderRadius: '10px', boxShadow: '0 10px 30px rgba(0,0,0,0.25)',
            fontFamily: 'system-ui, sans-serif', color: '#1f2937', padding: '18px 20px'
        });

        const title = document.createElement('div');
        title.textContent = 'Scraping Stopped';
        Object.assign(title.style, { fontSize: '18px', fontWeight: '700', marginBottom: '6px', color: '#842029' });

        const body = document.createElement('div');
        body.textContent = message;
        Object.assign(body.style, { fontSize: '14px', lineHeight: '1.4', whiteSpace: 'pre-wrap' });

        const close = document.createElement('button');
        close.id = 'ids-scrape-warning-close';
        close.textContent = 'Close';
        Object.assign(close.style, {
            marginTop: '14px', border: '1px solid #d1d5db', background: '#fff',
            borderRadius: '6px', padding: '8px 14px', cursor: 'pointer'
        });
        close.addEventListener('click', () => overlay.remove());

        panel.append(title, body, close);
        overlay.appendChild(panel);
        document.documentElement.appendChild(overlay);
        return true;
    }
"#;

/// Start hover-highlight selection; the clicked element's selector lands in
/// `window.__harvesterPicked`
pub const PICK_START_SCRIPT: &str = r#"
    (() => {
        if (window.__harvesterPickCleanup) window.__harvesterPickCleanup();
        window.__harvesterPicked = '';

        const style = document.createElement('style');
        style.id = 'highlight-style';
        style.textContent = `.ids-hover-highlight {
            outline: 2px solid #ff0000 !important;
            outline-offset: -2px !important;
            background-color: rgba(255, 0, 0, 0.1) !important;
            cursor: pointer !important;
        }`;
        document.head.appendChild(style);

        let hovered = null;
        const over = (e) => {
            if (hovered) hovered.classList.remove('ids-hover-highlight');
            hovered = e.target;
            hovered.classList.add('ids-hover-highlight');
        };
        const out = (e) => e.target.classList.remove('ids-hover-highlight');
        const describe = (el) => {
            const button = el.closest('button') || el;
            const label = button.getAttribute('aria-label');
            if (label) return `${button.tagName.toLowerCase()}[aria-label="${label}"]`;
            if (button.id) return `#${CSS.escape(button.id)}`;
            const classes = Array.from(button.classList)
                .filter(c => c !== 'ids-hover-highlight')
                .map(c => `.${CSS.escape(c)}`)
                .join('');
            return button.tagName.toLowerCase() + classes;
        };
        const click = (e) => {
            e.preventDefault();
            e.stopPropagation();
            window.__harvesterPicked = describe(e.target);
            window.__harvesterPickCleanup();
        };

        document.addEventListener('mouseover', over, true);
        document.addEventListener('mouseout', out, true);
        document.addEventListener('click', click, true);

        window.__harvesterPickCleanup = () => {
            document.removeEventListener('mouseover', over, true);
            document.removeEventListener('mouseout', out, true);
            document.removeEventListener('click', click, true);
            if (hovered) hovered.classList.remove('ids-hover-highlight');
            style.remove();
            window.__harvesterPickCleanup = null;
        };
        return true;
    })()
"#;

/// `{selector}` picked so far, empty while the user has not clicked
pub const PICK_POLL_SCRIPT: &str = r#"
    (() => ({ selector: window.__harvesterPicked || '' }))()
"#;

pub const PICK_CANCEL_SCRIPT: &str = r#"
    (() => {
        if (window.__harvesterPickCleanup) window.__harvesterPickCleanup();
        return true;
    })()
"#;

/// Invoke a function-valued script with JSON-encoded arguments
pub fn call(script: &str, args: &[Value]) -> String {
    let args = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("({})({})", script.trim(), args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_encodes_arguments() {
        let script = call(NEXT_PRESENT_SCRIPT, &[json!(r#"button[aria-label="Next"]"#)]);
        assert!(script.starts_with("((selector) =>"));
        assert!(script.ends_with(r#"("button[aria-label=\"Next\"]")"#));
    }

    #[test]
    fn test_challenge_scripts_embed_helpers() {
        assert!(block_status_script().contains("cf-chl-widget"));
        assert!(watch_challenge_script().contains("MutationObserver"));
    }

    #[test]
    fn test_scripts_use_table_classes() {
        assert!(ROWS_SCRIPT.contains(ROW_CLASS));
        assert!(ROWS_SCRIPT.contains(CELL_CLASS));
    }
}
