//! Value-level translation to the target platform's grammar.

use canon_store::NetworkType;

/// Map a canonical network-address type to the target address type.
pub fn address_type(net_type: NetworkType) -> &'static str {
    match net_type {
        NetworkType::Host | NetworkType::Network => "ip-netmask",
        NetworkType::Range => "ip-range",
        NetworkType::Fqdn => "fqdn",
    }
}

/// Rewrite a URL pattern into the target's wildcard grammar.
///
/// The source expresses wildcards regex-style; the target uses glob-style
/// tokens separated by dots. A leading `.*` becomes `*.`, a leading `*`
/// not followed by a dot gets one inserted, and a trailing `*` not
/// preceded by a dot gets one inserted before it.
pub fn rewrite_url_wildcard(url: &str) -> String {
    let mut out = if let Some(rest) = url.strip_prefix(".*") {
        format!("*.{rest}")
    } else if url.starts_with('*') && !url.starts_with("*.") {
        format!("*.{}", &url[1..])
    } else {
        url.to_string()
    };
    if out.ends_with('*') && !out.ends_with(".*") && out.len() > 1 {
        out.insert(out.len() - 1, '.');
    }
    out
}
