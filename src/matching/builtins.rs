//! Built-in request equality predicates

use url::form_urlencoded;

use crate::http::Request;

/// Same method
pub fn method(r1: &Request, r2: &Request) -> bool {
    r1.method == r2.method
}

/// Exact normalized URI
pub fn uri(r1: &Request, r2: &Request) -> bool {
    r1.uri == r2.uri
}

/// Same host
pub fn host(r1: &Request, r2: &Request) -> bool {
    match (r1.parsed_uri(), r2.parsed_uri()) {
        (Some(a), Some(b)) => a.host_str() == b.host_str(),
        _ => r1.uri == r2.uri,
    }
}

/// Same path, ignoring query and fragment
pub fn path(r1: &Request, r2: &Request) -> bool {
    match (r1.parsed_uri(), r2.parsed_uri()) {
        (Some(a), Some(b)) => a.path() == b.path(),
        _ => split_uri(&r1.uri).0 == split_uri(&r2.uri).0,
    }
}

/// Byte-identical body
pub fn body(r1: &Request, r2: &Request) -> bool {
    r1.body.as_bytes() == r2.body.as_bytes()
}

/// Same header names and values, regardless of order
pub fn headers(r1: &Request, r2: &Request) -> bool {
    let sorted = |r: &Request| {
        r.headers
            .iter()
            .map(|(name, values)| {
                let mut values = values.clone();
                values.sort();
                (name.clone(), values)
            })
            .collect::<Vec<_>>()
    };
    sorted(r1) == sorted(r2)
}

/// Bodies parse as JSON and are equal as data
pub fn body_as_json(r1: &Request, r2: &Request) -> bool {
    let a = serde_json::from_slice::<serde_json::Value>(r1.body.as_bytes());
    let b = serde_json::from_slice::<serde_json::Value>(r2.body.as_bytes());
    match (a, b) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Same query parameters, regardless of order
pub fn query(r1: &Request, r2: &Request) -> bool {
    let mut a = parse_query(split_uri(&r1.uri).1);
    let mut b = parse_query(split_uri(&r2.uri).1);
    a.sort();
    b.sort();
    a == b
}

/// Split a URI into (everything before `?`, query, fragment)
pub(crate) fn split_uri(uri: &str) -> (&str, &str, &str) {
    let (rest, fragment) = uri.split_once('#').unwrap_or((uri, ""));
    let (base, query) = rest.split_once('?').unwrap_or((rest, ""));
    (base, query, fragment)
}

/// Decode `a=1&b=2` into pairs, keeping repeated keys
pub(crate) fn parse_query(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Remove the named parameters (and their `name[]` array form) from a URI
pub(crate) fn strip_params(uri: &str, names: &[String]) -> String {
    let (base, query, fragment) = split_uri(uri);
    let kept = form_urlencoded::parse(query.as_bytes()).filter(|(key, _)| {
        let key: &str = key;
        let key = key.strip_suffix("[]").unwrap_or(key);
        !names.iter().any(|name| name == key)
    });
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(kept)
        .finish();

    let mut stripped = base.to_string();
    if !query.is_empty() {
        stripped.push('?');
        stripped.push_str(&query);
    }
    if !fragment.is_empty() {
        stripped.push('#');
        stripped.push_str(fragment);
    }
    stripped
}
