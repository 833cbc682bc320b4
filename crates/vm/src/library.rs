//! The platform library: natives for the JDK and third-party methods that
//! target classes call and that method replacements wrap.

use std::collections::BTreeMap;

use heurist_bytecode::Value;
use regex::Regex;

use crate::error::JavaException;
use crate::native::{NativeError, NativeRegistry, NativeResult};

pub const STRING: &str = "java/lang/String";
pub const INTEGER: &str = "java/lang/Integer";
pub const LONG: &str = "java/lang/Long";
pub const DOUBLE: &str = "java/lang/Double";
pub const OBJECTS: &str = "java/util/Objects";
pub const COLLECTION: &str = "java/util/Collection";
pub const MAP: &str = "java/util/Map";
pub const URI: &str = "java/net/URI";
pub const URL: &str = "java/net/URL";
pub const INET_ADDRESS: &str = "java/net/InetAddress";
pub const PATTERN: &str = "java/util/regex/Pattern";
pub const GSON: &str = "com/google/gson/Gson";
pub const SERVLET_REQUEST: &str = "javax/servlet/http/HttpServletRequest";

pub fn install(r: &mut NativeRegistry) {
    install_string(r);
    install_numbers(r);
    install_collections(r);
    install_net(r);
    install_misc(r);
}

fn receiver_str(args: &[Value]) -> Result<&str, NativeError> {
    match args.first() {
        Some(Value::String(s)) => Ok(s),
        _ => Err(JavaException::null_pointer().into()),
    }
}

/// A `String` argument that may be null.
fn opt_str(args: &[Value], i: usize) -> Option<&str> {
    args.get(i).and_then(Value::as_str)
}

/// A `String` argument that must not be null.
fn arg_str(args: &[Value], i: usize) -> Result<&str, NativeError> {
    opt_str(args, i).ok_or_else(|| JavaException::null_pointer().into())
}

fn boolean(b: bool) -> NativeResult {
    Ok(Some(Value::Bool(b)))
}

fn install_string(r: &mut NativeRegistry) {
    r.register(STRING, "equals", "(Ljava/lang/Object;)Z", |args| {
        let s = receiver_str(args)?;
        boolean(matches!(args.get(1), Some(Value::String(o)) if o == s))
    });
    r.register(STRING, "equalsIgnoreCase", "(Ljava/lang/String;)Z", |args| {
        let s = receiver_str(args)?;
        boolean(opt_str(args, 1).is_some_and(|o| o.to_lowercase() == s.to_lowercase()))
    });
    r.register(STRING, "startsWith", "(Ljava/lang/String;)Z", |args| {
        boolean(receiver_str(args)?.starts_with(arg_str(args, 1)?))
    });
    r.register(STRING, "startsWith", "(Ljava/lang/String;I)Z", |args| {
        let s = receiver_str(args)?;
        let prefix = arg_str(args, 1)?;
        let offset = args.get(2).and_then(Value::as_int).unwrap_or(0);
        let hit = usize::try_from(offset).ok().is_some_and(|o| {
            let chars: Vec<char> = s.chars().collect();
            o <= chars.len() && chars[o..].iter().collect::<String>().starts_with(prefix)
        });
        boolean(hit)
    });
    r.register(STRING, "endsWith", "(Ljava/lang/String;)Z", |args| {
        boolean(receiver_str(args)?.ends_with(arg_str(args, 1)?))
    });
    r.register(STRING, "isEmpty", "()Z", |args| {
        boolean(receiver_str(args)?.is_empty())
    });
    r.register(STRING, "contains", "(Ljava/lang/CharSequence;)Z", |args| {
        boolean(receiver_str(args)?.contains(arg_str(args, 1)?))
    });
    r.register(STRING, "matches", "(Ljava/lang/String;)Z", |args| {
        let s = receiver_str(args)?;
        full_match(arg_str(args, 1)?, s).map(|b| Some(Value::Bool(b)))
    });
    r.register(STRING, "length", "()I", |args| {
        Ok(Some(Value::Int(receiver_str(args)?.chars().count() as i64)))
    });
}

/// Anchored match, as `String.matches` / `Pattern.matches`.
pub fn full_match(pattern: &str, input: &str) -> Result<bool, NativeError> {
    let re = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
        NativeError::Thrown(JavaException::new(
            "java.util.regex.PatternSyntaxException",
            Some(e.to_string()),
        ))
    })?;
    Ok(re.is_match(input))
}

fn install_numbers(r: &mut NativeRegistry) {
    r.register(INTEGER, "parseInt", "(Ljava/lang/String;)I", |args| {
        let s = opt_str(args, 0).ok_or_else(|| {
            JavaException::new(
                "java.lang.NumberFormatException",
                Some("Cannot parse null string: null".into()),
            )
        })?;
        let n: i32 = s.parse().map_err(|_| JavaException::number_format(s))?;
        Ok(Some(Value::Int(n as i64)))
    });
    r.register(LONG, "parseLong", "(Ljava/lang/String;)J", |args| {
        let s = opt_str(args, 0).ok_or_else(|| {
            JavaException::new(
                "java.lang.NumberFormatException",
                Some("Cannot parse null string: null".into()),
            )
        })?;
        let n: i64 = s.parse().map_err(|_| JavaException::number_format(s))?;
        Ok(Some(Value::Int(n)))
    });
    r.register(DOUBLE, "parseDouble", "(Ljava/lang/String;)D", |args| {
        let s = arg_str(args, 0)?;
        parse_java_double(s)
            .map(|f| Some(Value::Float(f)))
            .ok_or_else(|| JavaException::number_format(s).into())
    });
}

/// `Double.parseDouble` without hex floats or `d`/`f` suffixes.
pub fn parse_java_double(s: &str) -> Option<f64> {
    let t = s.trim();
    let body = t.strip_prefix(['-', '+']).unwrap_or(t);
    if body == "NaN" || body == "Infinity" {
        return t.parse().ok();
    }
    if !body.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+')) {
        return None;
    }
    t.parse().ok()
}

fn install_collections(r: &mut NativeRegistry) {
    r.register(COLLECTION, "contains", "(Ljava/lang/Object;)Z", |args| match args.first() {
        Some(Value::List(items)) => boolean(args.get(1).is_some_and(|o| items.contains(o))),
        _ => Err(JavaException::null_pointer().into()),
    });
    r.register(COLLECTION, "isEmpty", "()Z", |args| match args.first() {
        Some(Value::List(items)) => boolean(items.is_empty()),
        _ => Err(JavaException::null_pointer().into()),
    });
    r.register(COLLECTION, "size", "()I", |args| match args.first() {
        Some(Value::List(items)) => Ok(Some(Value::Int(items.len() as i64))),
        _ => Err(JavaException::null_pointer().into()),
    });
    r.register(MAP, "containsKey", "(Ljava/lang/Object;)Z", |args| match args.first() {
        Some(Value::Map(m)) => boolean(opt_str(args, 1).is_some_and(|k| m.contains_key(k))),
        _ => Err(JavaException::null_pointer().into()),
    });
    r.register(MAP, "get", "(Ljava/lang/Object;)Ljava/lang/Object;", |args| match args.first() {
        Some(Value::Map(m)) => Ok(Some(
            opt_str(args, 1)
                .and_then(|k| m.get(k))
                .cloned()
                .unwrap_or(Value::Null),
        )),
        _ => Err(JavaException::null_pointer().into()),
    });
    r.register(OBJECTS, "equals", "(Ljava/lang/Object;Ljava/lang/Object;)Z", |args| {
        boolean(args.first() == args.get(1))
    });
}

/// Checks `URI.create` syntax: absolute URIs must parse, relative ones must
/// resolve against a base and contain no illegal characters.
pub fn check_uri(s: &str) -> Result<(), JavaException> {
    if s.chars().any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '\\' | '^' | '`')) {
        return Err(JavaException::illegal_argument(format!("Illegal character in URI: {s}")));
    }
    match url::Url::parse(s) {
        Ok(_) => Ok(()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = url::Url::parse("http://localhost/")
                .map_err(|e| JavaException::illegal_argument(e.to_string()))?;
            base.join(s)
                .map(|_| ())
                .map_err(|e| JavaException::illegal_argument(format!("{e}: {s}")))
        }
        Err(e) => Err(JavaException::illegal_argument(format!("{e}: {s}"))),
    }
}

fn install_net(r: &mut NativeRegistry) {
    r.register(URI, "create", "(Ljava/lang/String;)Ljava/net/URI;", |args| {
        let s = arg_str(args, 0)?;
        check_uri(s)?;
        Ok(Some(Value::String(s.to_string())))
    });
    // URL objects are their string form; the connection is described, not opened
    r.register(URL, "openConnection", "()Ljava/net/URLConnection;", |args| {
        let s = receiver_str(args)?;
        let url = url::Url::parse(s).map_err(|e| {
            JavaException::new("java.net.MalformedURLException", Some(e.to_string()))
        })?;
        let mut conn = BTreeMap::new();
        conn.insert("protocol".to_string(), Value::String(url.scheme().to_string()));
        conn.insert(
            "host".to_string(),
            url.host_str().map(|h| Value::String(h.to_string())).unwrap_or(Value::Null),
        );
        conn.insert(
            "port".to_string(),
            url.port_or_known_default().map(|p| Value::Int(p as i64)).unwrap_or(Value::Null),
        );
        Ok(Some(Value::Map(conn)))
    });
    r.register(INET_ADDRESS, "getByName", "(Ljava/lang/String;)Ljava/net/InetAddress;", |args| {
        let host = opt_str(args, 0).unwrap_or("localhost");
        Ok(Some(Value::String(host.to_string())))
    });
}

fn install_misc(r: &mut NativeRegistry) {
    r.register(
        PATTERN,
        "matches",
        "(Ljava/lang/String;Ljava/lang/CharSequence;)Z",
        |args| {
            let pattern = arg_str(args, 0)?;
            let input = arg_str(args, 1)?;
            full_match(pattern, input).map(|b| Some(Value::Bool(b)))
        },
    );
    r.register(
        GSON,
        "fromJson",
        "(Ljava/lang/String;Ljava/lang/Class;)Ljava/lang/Object;",
        |args| {
            let Some(json) = opt_str(args, 0) else {
                return Ok(Some(Value::Null));
            };
            let parsed: serde_json::Value = serde_json::from_str(json).map_err(|e| {
                JavaException::new("com.google.gson.JsonSyntaxException", Some(e.to_string()))
            })?;
            Ok(Some(from_json(parsed)))
        },
    );
    r.register(SERVLET_REQUEST, "getParameter", "(Ljava/lang/String;)Ljava/lang/String;", |args| {
        request_lookup(args, "parameters", false)
    });
    r.register(SERVLET_REQUEST, "getHeader", "(Ljava/lang/String;)Ljava/lang/String;", |args| {
        request_lookup(args, "headers", true)
    });
}

/// Requests are maps with `parameters` and `headers` sub-maps.
fn request_lookup(args: &[Value], section: &str, ignore_case: bool) -> NativeResult {
    let Some(Value::Map(request)) = args.first() else {
        return Err(JavaException::null_pointer().into());
    };
    let name = opt_str(args, 1).unwrap_or_default();
    let found = match request.get(section) {
        Some(Value::Map(entries)) => entries
            .iter()
            .find(|(k, _)| if ignore_case { k.eq_ignore_ascii_case(name) } else { *k == name })
            .map(|(_, v)| v.clone()),
        _ => None,
    };
    Ok(Some(found.unwrap_or(Value::Null)))
}

pub fn from_json(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(fields) => {
            Value::Map(fields.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}
