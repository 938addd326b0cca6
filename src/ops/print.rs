// opal-core - Display and code-string rendering
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! String rendering for every kind.
//!
//! `to_code_string` renders readable forms (strings quoted, characters
//! named); `to_display_string` renders user-facing text (strings raw,
//! nil empty). Neither forces a pending lazy sequence: unrealized tails
//! print as `...`. Sequence kinds print at most [`SEQ_PRINT_LIMIT`]
//! elements so unbounded sequences stay printable.

use std::fmt::Write;

use crate::value::OpalVal;

/// Cap on printed elements for sequence kinds (not for concrete
/// collections, which are always finite).
const SEQ_PRINT_LIMIT: usize = 32;

/// Readable rendition of a value.
pub fn to_code_string(v: &OpalVal) -> String {
    let mut out = String::new();
    write_code(&mut out, v);
    out
}

/// User-facing rendition: strings raw, characters raw, nil empty.
pub fn to_display_string(v: &OpalVal) -> String {
    match v {
        OpalVal::Nil => String::new(),
        OpalVal::String(s) => s.to_string(),
        OpalVal::Char(c) => c.to_string(),
        _ => to_code_string(v),
    }
}

fn write_code(out: &mut String, v: &OpalVal) {
    match v {
        OpalVal::Nil => out.push_str("nil"),
        OpalVal::Bool(b) => {
            let _ = write!(out, "{}", b);
        }
        OpalVal::Int(n) => {
            let _ = write!(out, "{}", n);
        }
        OpalVal::Float(n) => write_float(out, *n),
        OpalVal::Ratio(num, den) => {
            let _ = write!(out, "{}/{}", num, den);
        }
        OpalVal::Char(c) => {
            let _ = write!(out, "\\{}", format_char(*c));
        }
        OpalVal::String(s) => {
            let _ = write!(out, "\"{}\"", escape_string(s));
        }
        OpalVal::Symbol(sym, _) => {
            let _ = write!(out, "{}", sym);
        }
        OpalVal::Keyword(kw) => {
            let _ = write!(out, "{}", kw);
        }
        OpalVal::List(l) => {
            out.push('(');
            for (i, item) in l.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_code(out, item);
            }
            out.push(')');
        }
        OpalVal::Vector(vec) => {
            out.push('[');
            for (i, item) in vec.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_code(out, item);
            }
            out.push(']');
        }
        OpalVal::ArrayMap(m) => write_map(out, m.iter()),
        OpalVal::HashMap(m) => write_map(out, m.iter()),
        OpalVal::SortedMap(m) => write_map(out, m.iter()),
        OpalVal::HashSet(s) => write_set(out, s.iter()),
        OpalVal::SortedSet(s) => write_set(out, s.iter()),
        OpalVal::TransientVector(_) => out.push_str("#<transient-vector>"),
        OpalVal::TransientHashMap(_) => out.push_str("#<transient-hash-map>"),
        OpalVal::TransientHashSet(_) => out.push_str("#<transient-hash-set>"),
        OpalVal::TransientSortedMap(_) => out.push_str("#<transient-sorted-map>"),
        OpalVal::TransientSortedSet(_) => out.push_str("#<transient-sorted-set>"),
        OpalVal::Cons(_)
        | OpalVal::Range(_)
        | OpalVal::IntegerRange(_)
        | OpalVal::Repeat(_)
        | OpalVal::LazySeq(_)
        | OpalVal::ChunkedCons(_)
        | OpalVal::IteratorSeq(_)
        | OpalVal::VectorSeq(_)
        | OpalVal::IndexedSeq(_)
        | OpalVal::StringSeq(_) => write_seq(out, v),
        OpalVal::ChunkBuffer(buf) => {
            let _ = write!(out, "#<chunk-buffer {}>", buf.len());
        }
        OpalVal::ArrayChunk(chunk) => {
            let _ = write!(out, "#<chunk {}>", chunk.len());
        }
        OpalVal::NativeFn(f) => {
            let _ = write!(out, "#<native-fn {}>", f.name());
        }
        OpalVal::CompiledFn(f) => {
            let _ = write!(out, "{:?}", f);
        }
        OpalVal::MultiFn(f) => {
            let _ = write!(out, "{:?}", f);
        }
        OpalVal::Namespace(ns) => {
            let _ = write!(out, "#<ns {}>", ns.name());
        }
        OpalVal::Var(var) => {
            let _ = write!(out, "#'{}", var.qualified_name());
        }
        OpalVal::VarThreadBinding(b) => {
            let _ = write!(out, "#<thread-binding #'{}>", b.var_name);
        }
        OpalVal::VarUnboundRoot(u) => {
            let _ = write!(out, "#<unbound #'{}>", u.var_name);
        }
        OpalVal::Atom(a) => {
            out.push_str("#<atom ");
            write_code(out, &a.deref());
            out.push('>');
        }
        OpalVal::Volatile(vol) => {
            out.push_str("#<volatile ");
            write_code(out, &vol.deref());
            out.push('>');
        }
        OpalVal::Delay(d) => {
            if d.is_realized() {
                match d.force() {
                    Ok(inner) => {
                        out.push_str("#<delay ");
                        write_code(out, &inner);
                        out.push('>');
                    }
                    Err(_) => out.push_str("#<delay failed>"),
                }
            } else {
                out.push_str("#<delay pending>");
            }
        }
        OpalVal::Reduced(inner) => {
            out.push_str("#reduced[");
            write_code(out, inner);
            out.push(']');
        }
        OpalVal::TaggedLiteral(tl) => {
            out.push('#');
            write_code(out, &tl.tag);
            out.push(' ');
            write_code(out, &tl.form);
        }
        OpalVal::Extended(e) => match e.to_code_string_op(v) {
            Some(Ok(s)) => out.push_str(&s),
            _ => out.push_str("#<extended>"),
        },
    }
}

fn write_map<'a>(out: &mut String, entries: impl Iterator<Item = (&'a OpalVal, &'a OpalVal)>) {
    out.push('{');
    for (i, (k, v)) in entries.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_code(out, k);
        out.push(' ');
        write_code(out, v);
    }
    out.push('}');
}

fn write_set<'a>(out: &mut String, elements: impl Iterator<Item = &'a OpalVal>) {
    out.push_str("#{");
    for (i, item) in elements.enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write_code(out, item);
    }
    out.push('}');
}

/// Print a sequence without running deferred producers: realized
/// elements print normally; the first pending or over-limit position
/// prints as `...`.
fn write_seq(out: &mut String, v: &OpalVal) {
    out.push('(');
    let mut current = v.clone();
    let mut printed = 0usize;
    let ellipsis = |out: &mut String, printed: usize| {
        if printed > 0 {
            out.push(' ');
        }
        out.push_str("...");
    };
    loop {
        match &current {
            OpalVal::Nil => break,
            OpalVal::LazySeq(ls) => {
                if !ls.is_realized() {
                    ellipsis(out, printed);
                    break;
                }
                // Realized: force returns the memo without running the
                // producer.
                match ls.force() {
                    Ok(memo) => {
                        current = memo;
                        continue;
                    }
                    Err(_) => {
                        ellipsis(out, printed);
                        break;
                    }
                }
            }
            _ => {}
        }
        // Normalize empties (e.g. an exhausted range) to nil; seq never
        // forces non-lazy kinds.
        current = match crate::ops::seqs::seq(&current) {
            Ok(c) => c,
            Err(_) => {
                ellipsis(out, printed);
                break;
            }
        };
        if current.is_nil() {
            break;
        }
        if printed >= SEQ_PRINT_LIMIT {
            ellipsis(out, printed);
            break;
        }
        let Ok(first) = crate::ops::seqs::first(&current) else {
            ellipsis(out, printed);
            break;
        };
        // Step without forcing: a cons or chunk tail is taken raw and
        // re-examined at the top of the loop.
        let successor = match &current {
            OpalVal::Cons(c) => c.rest().clone(),
            OpalVal::ChunkedCons(cc) => {
                if cc.chunk().len() > 1 {
                    match cc.chunk().drop_first() {
                        Ok(chunk) => OpalVal::chunked_cons(crate::seq::ChunkedCons::new(
                            chunk,
                            cc.rest().clone(),
                        )),
                        Err(_) => cc.rest().clone(),
                    }
                } else {
                    cc.rest().clone()
                }
            }
            _ => match crate::ops::seqs::next(&current) {
                Ok(n) => n,
                Err(_) => {
                    ellipsis(out, printed);
                    break;
                }
            },
        };
        if printed > 0 {
            out.push(' ');
        }
        write_code(out, &first);
        printed += 1;
        current = successor;
    }
    out.push(')');
}

fn write_float(out: &mut String, n: f64) {
    if n.is_nan() {
        out.push_str("##NaN");
    } else if n.is_infinite() {
        if n > 0.0 {
            out.push_str("##Inf");
        } else {
            out.push_str("##-Inf");
        }
    } else if n.fract() == 0.0 {
        let _ = write!(out, "{}.0", n);
    } else {
        let _ = write!(out, "{}", n);
    }
}

fn format_char(c: char) -> String {
    match c {
        '\n' => "newline".to_string(),
        ' ' => "space".to_string(),
        '\t' => "tab".to_string(),
        '\r' => "return".to_string(),
        '\x08' => "backspace".to_string(),
        '\x0C' => "formfeed".to_string(),
        _ => c.to_string(),
    }
}

fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            '\r' => result.push_str("\\r"),
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            _ => result.push(c),
        }
    }
    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_rendering() {
        assert_eq!(to_code_string(&OpalVal::Nil), "nil");
        assert_eq!(to_code_string(&OpalVal::int(42)), "42");
        assert_eq!(to_code_string(&OpalVal::float(1.0)), "1.0");
        assert_eq!(to_code_string(&OpalVal::float(f64::NAN)), "##NaN");
        assert_eq!(to_code_string(&OpalVal::string("a\nb")), "\"a\\nb\"");
        assert_eq!(to_code_string(&OpalVal::char('\n')), "\\newline");
        assert_eq!(to_code_string(&OpalVal::keyword_str("k")), ":k");
    }

    #[test]
    fn test_display_vs_code() {
        assert_eq!(to_display_string(&OpalVal::string("hi")), "hi");
        assert_eq!(to_code_string(&OpalVal::string("hi")), "\"hi\"");
        assert_eq!(to_display_string(&OpalVal::Nil), "");
        assert_eq!(to_display_string(&OpalVal::char('x')), "x");
    }

    #[test]
    fn test_collection_rendering() {
        let v = OpalVal::vector(vec![OpalVal::int(1), OpalVal::int(2)]);
        assert_eq!(to_code_string(&v), "[1 2]");
        let l = OpalVal::list(vec![OpalVal::int(1), OpalVal::int(2)]);
        assert_eq!(to_code_string(&l), "(1 2)");
    }

    #[test]
    fn test_pending_lazy_not_forced() {
        let ls = OpalVal::lazy_seq_native(std::rc::Rc::new(|| {
            panic!("must not be forced by printing");
        }));
        assert_eq!(to_code_string(&ls), "(...)");
    }
}
