use std::borrow::Cow;

const ACCESS_TOKEN_KEYS: [&str; 2] = ["\"access_token\"", "\"accessToken\""];

/// Masks the value of any `access_token` / `accessToken` JSON field found in `input`.
pub fn redact_access_token(input: &str) -> Cow<'_, str> {
    let mut redacted = input.to_string();

    for key in ACCESS_TOKEN_KEYS {
        if !redacted.contains(key) {
            continue;
        }
        let mut out = String::with_capacity(redacted.len());
        let mut rest = redacted.as_str();
        while let Some(idx) = rest.find(key) {
            let after_key = idx + key.len();
            out.push_str(&rest[..after_key]);
            rest = &rest[after_key..];

            // Keep `: "` as-is, then swallow the quoted value.
            let Some(open) = rest.find('"') else {
                break;
            };
            if !rest[..open].trim().trim_start_matches(':').trim().is_empty() {
                continue;
            }
            out.push_str(&rest[..=open]);
            rest = &rest[open + 1..];

            let close = rest.find('"').unwrap_or(rest.len());
            out.push_str("REDACTED");
            rest = &rest[close..];
        }
        out.push_str(rest);
        redacted = out;
    }

    if redacted == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(redacted)
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let nee = needle.as_bytes();
    if nee.is_empty() {
        return Some(0);
    }
    if nee.len() > hay.len() {
        return None;
    }

    (0..=hay.len() - nee.len()).find(|&i| {
        hay[i..i + nee.len()]
            .iter()
            .zip(nee)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}

fn redact_bearer_values(text: String) -> String {
    const BEARER: &str = "bearer ";

    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(idx) = find_ascii_case_insensitive(rest, BEARER) {
        let after = idx + BEARER.len();
        out.push_str(&rest[..after]);
        rest = &rest[after..];

        let consumed: usize = rest
            .chars()
            .take_while(|ch| !ch.is_whitespace() && *ch != '"' && *ch != ',')
            .map(char::len_utf8)
            .sum();
        if consumed > 0 {
            out.push_str("REDACTED");
        }
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}

/// Strips bearer credentials and token fields from text that may reach logs or notifications.
pub fn redact_secrets(input: &str) -> Cow<'_, str> {
    let value = redact_bearer_values(redact_access_token(input).into_owned());

    if value == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(value)
    }
}
