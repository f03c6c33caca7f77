//! Structural CTE value type and renderer.
//!
//! Builds one named CTE per logical step and chains them with `WITH`,
//! rather than string-concatenating SQL fragments: a named, ordered
//! list of `Cte`s plus a single render step, per `spec.md` §9's "replace
//! textual SQL composition ... with a structural builder."

/// One Common Table Expression: a name plus its body SQL.
///
/// The body is still free-form SQL text (DuckDB's SQL surface is wide —
/// window functions, `PERCENTILE_CONT`, `STRING_AGG` — and re-modeling
/// all of it as a typed AST is out of scope per `spec.md` §1's framing
/// of the hard part as query *composition*, not a general SQL parser).
/// What's structural is the *assembly*: each CTE is a named unit with
/// one clear input (the previous CTE's name) and callers never
/// string-concatenate two CTEs' bodies together directly.
#[derive(Debug, Clone)]
pub struct Cte {
    pub name: String,
    pub body: String,
    /// Whether this CTE renders with DuckDB's `AS MATERIALIZED` hint
    /// (`EngineConfig::use_materialized`, SPEC_FULL.md §1.4): forces the
    /// CTE to be evaluated once into a temp table rather than re-run for
    /// each downstream reference.
    pub materialized: bool,
}

impl Cte {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Cte {
            name: name.into(),
            body: body.into(),
            materialized: false,
        }
    }

    /// Mark this CTE `AS MATERIALIZED`.
    pub fn materialized(mut self) -> Self {
        self.materialized = true;
        self
    }
}

/// An ordered sequence of CTEs plus a final `SELECT`, rendered as one
/// `WITH ... SELECT ...` statement.
#[derive(Debug, Clone, Default)]
pub struct CteQuery {
    ctes: Vec<Cte>,
    final_select: String,
}

impl CteQuery {
    pub fn new() -> Self {
        CteQuery::default()
    }

    pub fn push(&mut self, cte: Cte) -> &str {
        self.ctes.push(cte);
        &self.ctes.last().unwrap().name
    }

    pub fn set_final_select(&mut self, select: impl Into<String>) {
        self.final_select = select.into();
    }

    pub fn ctes(&self) -> &[Cte] {
        &self.ctes
    }

    /// Render the full `WITH ... SELECT ...` statement.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.ctes.is_empty() {
            out.push_str("WITH\n");
            let bodies: Vec<String> = self
                .ctes
                .iter()
                .map(|c| {
                    let modifier = if c.materialized { "MATERIALIZED " } else { "" };
                    format!("{} AS {modifier}(\n{}\n)", c.name, c.body)
                })
                .collect();
            out.push_str(&bodies.join(",\n"));
            out.push('\n');
        }
        out.push_str(&self.final_select);
        out
    }
}
