//! Cleanup of generated source text before it is compiled.
//!
//! Generated text arrives with HTML/JSON escapes for angle brackets and
//! wrapped in Markdown code fences. [`sanitize`] undoes both. It is total
//! (never fails) and idempotent: it repeats until the text stops changing.

/// Escape sequences and their replacements, applied in order.
const UNESCAPES: [(&str, &str); 7] = [
    ("/u003c", "<"),
    ("/u003e", ">"),
    ("\\u003c", "<"),
    ("\\u003e", ">"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&amp;", "&"),
];

const FENCE: &str = "```";

/// Clean `raw` to a fixpoint. A pass that changes the text always shortens
/// it, so this terminates.
pub fn sanitize(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn pass(text: &str) -> String {
    let mut unescaped = text.to_string();
    for (from, to) in UNESCAPES {
        unescaped = unescaped.replace(from, to);
    }

    let kept: Vec<&str> = unescaped
        .lines()
        .filter(|line| !line.trim_start().starts_with(FENCE))
        .collect();
    let joined = kept.join("\n");

    joined.replace(FENCE, "").trim().to_string()
}
