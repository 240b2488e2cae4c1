//! SQL dialect differences: quoting, placeholders, row limits and boolean tests.

/// Target SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// `"ident"`, `$1`, `limit n`.
    #[default]
    Postgres,
    /// `[ident]`, `@p0`, `select top n`.
    SqlServer,
}

impl Dialect {
    /// Schema used when none is configured.
    pub fn default_schema(self) -> &'static str {
        match self {
            Dialect::Postgres => "public",
            Dialect::SqlServer => "dbo",
        }
    }

    pub(crate) fn write_quoted(self, name: &str, out: &mut String) {
        let (open, close) = match self {
            Dialect::Postgres => ('"', '"'),
            Dialect::SqlServer => ('[', ']'),
        };
        out.push(open);
        for ch in name.chars() {
            if ch == close {
                out.push(close);
            }
            out.push(ch);
        }
        out.push(close);
    }

    /// Quote a single identifier part.
    pub fn quote(self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 2);
        self.write_quoted(name, &mut out);
        out
    }

    /// Placeholder for the `idx`-th bound parameter (1-based).
    pub fn placeholder(self, idx: usize) -> String {
        match self {
            Dialect::Postgres => format!("${idx}"),
            Dialect::SqlServer => format!("@p{}", idx.saturating_sub(1)),
        }
    }

    /// Null-tolerant boolean test on an already-quoted column.
    pub fn boolean_test(self, column: &str, expected: bool) -> String {
        match (self, expected) {
            (Dialect::Postgres, true) => format!("coalesce({column},false)=true"),
            (Dialect::Postgres, false) => format!("coalesce({column},false)=false"),
            (Dialect::SqlServer, true) => format!("coalesce({column},0)=1"),
            (Dialect::SqlServer, false) => format!("coalesce({column},0)=0"),
        }
    }

    /// Whether the outer statement of `sql` already carries a row cap.
    ///
    /// Caps inside subqueries and quoted text do not count.
    pub fn has_row_limit(self, sql: &str) -> bool {
        let outer = outer_text(sql);
        match self {
            Dialect::Postgres => outer.split_whitespace().any(|t| t == "limit"),
            Dialect::SqlServer => outer.contains("select top ") || outer.contains("distinct top "),
        }
    }

    /// Cap `sql` to `n` rows. Statements that already carry a cap are returned unchanged.
    pub fn apply_row_limit(self, sql: &str, n: usize) -> String {
        if n == 0 || self.has_row_limit(sql) {
            return sql.to_string();
        }
        match self {
            Dialect::Postgres => format!("{sql} limit {n}"),
            Dialect::SqlServer => {
                let lower = sql.to_ascii_lowercase();
                let Some(start) = lower.find("select ") else {
                    return sql.to_string();
                };
                let mut at = start + "select ".len();
                if lower[at..].starts_with("distinct ") {
                    at += "distinct ".len();
                }
                format!("{}top {n} {}", &sql[..at], &sql[at..])
            }
        }
    }
}

/// Lowercased `sql` with quoted text and parenthesized groups blanked out.
fn outer_text(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut depth = 0usize;
    let mut closing: Option<char> = None;
    for ch in sql.chars() {
        if let Some(close) = closing {
            if ch == close {
                closing = None;
            }
            out.push(' ');
            continue;
        }
        match ch {
            '\'' | '"' => closing = Some(ch),
            '[' => closing = Some(']'),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => {
                out.push(ch.to_ascii_lowercase());
                continue;
            }
            _ => {}
        }
        out.push(' ');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(1), "$1");
        assert_eq!(Dialect::SqlServer.placeholder(1), "@p0");
        assert_eq!(Dialect::SqlServer.placeholder(3), "@p2");
    }

    #[test]
    fn top_rewrite_is_idempotent() {
        let d = Dialect::SqlServer;
        let once = d.apply_row_limit("select * from [dbo].[Orders]", 5);
        assert_eq!(once, "select top 5 * from [dbo].[Orders]");
        assert_eq!(d.apply_row_limit(&once, 5), once);
        assert_eq!(
            d.apply_row_limit("select top 10 * from [dbo].[Orders]", 5),
            "select top 10 * from [dbo].[Orders]"
        );
    }

    #[test]
    fn top_goes_after_distinct() {
        assert_eq!(
            Dialect::SqlServer.apply_row_limit("select distinct [Name] from [dbo].[T]", 3),
            "select distinct top 3 [Name] from [dbo].[T]"
        );
    }

    #[test]
    fn limit_is_idempotent() {
        let d = Dialect::Postgres;
        let once = d.apply_row_limit(r#"select * from "public"."Orders""#, 5);
        assert_eq!(once, r#"select * from "public"."Orders" limit 5"#);
        assert_eq!(d.apply_row_limit(&once, 7), once);
    }

    #[test]
    fn nested_caps_do_not_count() {
        let d = Dialect::Postgres;
        assert_eq!(
            d.apply_row_limit("select * from (select * from t limit 3) as s", 5),
            "select * from (select * from t limit 3) as s limit 5"
        );
        assert_eq!(
            d.apply_row_limit("select * from t where note = 'no limit'", 2),
            "select * from t where note = 'no limit' limit 2"
        );

        let d = Dialect::SqlServer;
        assert_eq!(
            d.apply_row_limit("select * from t where id in (select top 3 id from u)", 5),
            "select top 5 * from t where id in (select top 3 id from u)"
        );
        assert!(d.has_row_limit("select top (10) * from t"));
    }

    #[test]
    fn zero_means_unlimited() {
        assert_eq!(Dialect::Postgres.apply_row_limit("select 1", 0), "select 1");
    }

    #[test]
    fn boolean_tests() {
        assert_eq!(
            Dialect::SqlServer.boolean_test("[Active]", true),
            "coalesce([Active],0)=1"
        );
        assert_eq!(
            Dialect::Postgres.boolean_test(r#""Active""#, false),
            r#"coalesce("Active",false)=false"#
        );
    }
}
