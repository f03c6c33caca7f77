//! Minimal SQL expression helpers: identifier quoting and value escaping.

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded quotes (§4.9 "WHERE
/// rendering": "Values are SQL-escaped (single quotes doubled)").
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_doubles_embedded_quotes() {
        assert_eq!(quote_ident("col"), "\"col\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn quote_literal_doubles_embedded_single_quotes() {
        assert_eq!(quote_literal("RUN"), "'RUN'");
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }
}
