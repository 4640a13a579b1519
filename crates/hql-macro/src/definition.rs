//! Parsing of `(defmacro name (params...) body...)` / `(macro name (params...)
//! body...)` forms (spec.md §4.4).

use hql_common::{MacroError, MacroErrorKind, Position};
use hql_parser::SExpr;

#[derive(Debug)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<String>,
    pub rest_param: Option<String>,
    pub body: Vec<SExpr>,
    pub is_system: bool,
}

fn no_position() -> Position {
    Position::new(std::sync::Arc::from(""), 1, 1, 0)
}

/// `true` if `form` is a `defmacro` or `macro` definition (used to filter
/// definitions out of the expanded program, per spec.md §4.4 step 4).
pub fn is_macro_definition(form: &SExpr) -> bool {
    form.head_is("defmacro") || form.head_is("macro")
}

pub fn parse(form: &SExpr) -> Result<MacroDef, MacroError> {
    let elems = form
        .as_list()
        .ok_or_else(|| bad_param(form, "macro definition must be a list"))?;
    let is_system = elems.first().is_some_and(|e| e.is_symbol("defmacro"));
    if elems.len() < 3 {
        return Err(bad_param(form, "expected (defmacro/macro name (params...) body...)"));
    }
    let name = elems[1]
        .as_symbol()
        .ok_or_else(|| bad_param(form, "macro name must be a symbol"))?
        .to_string();
    let param_list = elems[2]
        .as_list()
        .ok_or_else(|| bad_param(form, "macro parameter list must be a list"))?;

    let mut params = Vec::new();
    let mut rest_param = None;
    let mut i = 0;
    while i < param_list.len() {
        let p = param_list[i]
            .as_symbol()
            .ok_or_else(|| bad_param(form, "macro parameters must be symbols"))?;
        if p == "&" {
            let rest = param_list
                .get(i + 1)
                .and_then(|e| e.as_symbol())
                .ok_or_else(|| bad_param(form, "'&' must be followed by a rest parameter name"))?;
            if i + 2 != param_list.len() {
                return Err(bad_param(form, "rest parameter must be last"));
            }
            rest_param = Some(rest.to_string());
            break;
        }
        params.push(p.to_string());
        i += 1;
    }

    Ok(MacroDef {
        name,
        params,
        rest_param,
        body: elems[3..].to_vec(),
        is_system,
    })
}

fn bad_param(form: &SExpr, _detail: &str) -> MacroError {
    MacroError {
        macro_name: form
            .as_list()
            .and_then(|e| e.get(1))
            .and_then(|e| e.as_symbol())
            .unwrap_or("")
            .to_string(),
        kind: MacroErrorKind::BadParam,
        position: form.position.clone().unwrap_or_else(no_position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hql_parser::parse_source;
    use hql_common::position::SourceRegistry;

    fn parse_one(src: &str) -> SExpr {
        let mut reg = SourceRegistry::new();
        parse_source(&mut reg, "t.hql", src).unwrap().1.remove(0)
    }

    #[test]
    fn parses_defmacro_with_plain_params() {
        let form = parse_one("(defmacro twice (x) (+ x x))");
        let def = parse(&form).unwrap();
        assert_eq!(def.name, "twice");
        assert_eq!(def.params, vec!["x"]);
        assert!(def.rest_param.is_none());
        assert!(def.is_system);
    }

    #[test]
    fn parses_macro_with_rest_param() {
        let form = parse_one("(macro variadic (a & rest) a)");
        let def = parse(&form).unwrap();
        assert_eq!(def.params, vec!["a"]);
        assert_eq!(def.rest_param.as_deref(), Some("rest"));
        assert!(!def.is_system);
    }

    #[test]
    fn rest_param_not_last_is_bad_param() {
        let form = parse_one("(macro bad (& rest extra) rest)");
        assert_eq!(parse(&form).unwrap_err().kind, MacroErrorKind::BadParam);
    }
}
