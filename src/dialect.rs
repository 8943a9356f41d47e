/// Identifier quoting.
///
/// Table and column names are never interpolated raw: every identifier the
/// builder emits goes through an [`IdentifierEncoder`]. Sessions receive an
/// encoder at construction, so several dialects can be used side by side.
use serde::Deserialize;

/// Dialect-specific escaping of a table or column name.
pub trait IdentifierEncoder {
    fn encode(&self, name: &str) -> String;
}

impl<F> IdentifierEncoder for F
where
    F: Fn(&str) -> String,
{
    fn encode(&self, name: &str) -> String {
        self(name)
    }
}

/// Standard SQL quoting: `"name"`, embedded `"` doubled.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiEncoder;

impl IdentifierEncoder for AnsiEncoder {
    fn encode(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// MySQL quoting: `` `name` ``, embedded backtick doubled.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktickEncoder;

impl IdentifierEncoder for BacktickEncoder {
    fn encode(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// SQL Server quoting: `[name]`, embedded `]` doubled.
#[derive(Debug, Clone, Copy, Default)]
pub struct BracketEncoder;

impl IdentifierEncoder for BracketEncoder {
    fn encode(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }
}

/// Named quoting styles, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Ansi,
    Mysql,
    Sqlserver,
}

impl Dialect {
    pub fn encoder(self) -> Box<dyn IdentifierEncoder> {
        match self {
            Dialect::Ansi => Box::new(AnsiEncoder),
            Dialect::Mysql => Box::new(BacktickEncoder),
            Dialect::Sqlserver => Box::new(BracketEncoder),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ansi_quoting() {
        assert_eq!(AnsiEncoder.encode("users"), "\"users\"");
        assert_eq!(AnsiEncoder.encode("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_backtick_and_bracket_quoting() {
        assert_eq!(BacktickEncoder.encode("order"), "`order`");
        assert_eq!(BacktickEncoder.encode("we`ird"), "`we``ird`");
        assert_eq!(BracketEncoder.encode("user"), "[user]");
        assert_eq!(BracketEncoder.encode("a]b"), "[a]]b]");
    }

    #[test]
    fn test_closure_encoder() {
        let upper = |name: &str| name.to_uppercase();
        assert_eq!(upper.encode("id"), "ID");
    }

    #[test]
    fn test_dialect_selection() {
        assert_eq!(Dialect::default(), Dialect::Ansi);
        assert_eq!(Dialect::Mysql.encoder().encode("t"), "`t`");
        assert_eq!(Dialect::Sqlserver.encoder().encode("t"), "[t]");

        #[derive(Deserialize)]
        struct Holder {
            dialect: Dialect,
        }
        let holder: Holder = toml::from_str("dialect = \"sqlserver\"").unwrap();
        assert_eq!(holder.dialect, Dialect::Sqlserver);
    }
}
