//! CPLEX LP export
//!
//! Writes a [`LinearModel`] in the text format understood by CBC, HiGHS,
//! SCIP, Gurobi and friends, so a compiled model can be solved outside of
//! this toolkit.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::model::{LinearExpr, LinearModel, VarDomain};

pub fn write_lp(model: &LinearModel) -> String {
    let names = unique_names(model.variables().iter().map(|v| v.name.as_str()));
    let row_names = unique_names(model.constraints().iter().map(|c| c.name.as_str()));

    let mut out = String::new();
    let _ = writeln!(out, "\\ {}", model.name());
    out.push_str("Minimize\n obj: ");
    out.push_str(&fmt_lin(model.objective(), &names));
    out.push('\n');

    out.push_str("Subject To\n");
    for (c, row_name) in model.constraints().iter().zip(&row_names) {
        let _ = writeln!(
            out,
            " {}: {} = {}",
            row_name,
            fmt_lin(&c.expr, &names),
            fmt_num(c.rhs)
        );
    }

    out.push_str("Bounds\n");
    for (def, name) in model.variables().iter().zip(&names) {
        match def.upper {
            Some(upper) => {
                let _ = writeln!(out, " {} <= {} <= {}", fmt_num(def.lower), name, fmt_num(upper));
            }
            None => {
                let _ = writeln!(out, " {} >= {}", name, fmt_num(def.lower));
            }
        }
    }

    let integers: Vec<&str> = model
        .variables()
        .iter()
        .zip(&names)
        .filter(|(def, _)| def.domain == VarDomain::Integer)
        .map(|(_, name)| name.as_str())
        .collect();
    if !integers.is_empty() {
        out.push_str("General\n");
        for name in integers {
            let _ = writeln!(out, " {name}");
        }
    }
    out.push_str("End\n");
    out
}

/// LP identifiers: ASCII alphanumerics and `_`, not starting with a digit.
fn lp_name(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Sanitised names, suffixed with `_2`, `_3`, ... where sanitising makes
/// two of them equal.
fn unique_names<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut used = HashSet::new();
    raw.map(|name| {
        let base = lp_name(name);
        let mut candidate = base.clone();
        let mut n = 2;
        while !used.insert(candidate.clone()) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        candidate
    })
    .collect()
}

fn fmt_num(v: f64) -> String {
    if v.abs() < 1e15 && (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        format!("{v}")
    }
}

fn fmt_lin(expr: &LinearExpr, names: &[String]) -> String {
    let mut parts: Vec<String> = expr
        .terms()
        .map(|(var, coef)| {
            let name = &names[var.index()];
            if (coef - 1.0).abs() < 1e-12 {
                format!("+ {name}")
            } else if (coef + 1.0).abs() < 1e-12 {
                format!("- {name}")
            } else if coef < 0.0 {
                format!("- {} {name}", fmt_num(-coef))
            } else {
                format!("+ {} {name}", fmt_num(coef))
            }
        })
        .collect();
    if parts.is_empty() {
        parts.push("0".to_string());
    }
    if expr.constant().abs() > 1e-12 {
        parts.push(format!("{:+}", expr.constant()));
    }
    let joined = parts.join(" ");
    joined.strip_prefix("+ ").map(str::to_string).unwrap_or(joined)
}
