//! cellgrid_engine - Formula parsing, expression trees and evaluation.

pub(crate) mod builtins;
pub mod engine;

#[cfg(test)]
mod tests {
    use crate::engine::*;
    use std::collections::BTreeMap;

    /// Evaluates referenced cells recursively from a map of inputs.
    struct Inputs(BTreeMap<Position, Expr>);

    impl CellResolver for Inputs {
        fn resolve(&mut self, pos: Position) -> Option<Value> {
            match self.0.get(&pos).cloned() {
                Some(expr) => evaluate(&expr, self, EvalOptions::default()).ok(),
                None => Some(Value::Undefined),
            }
        }
    }

    fn sheet(cells: &[(&str, &str)]) -> Inputs {
        Inputs(
            cells
                .iter()
                .map(|(pos, input)| (pos.parse().unwrap(), parse_expr(input).unwrap()))
                .collect(),
        )
    }

    #[test]
    fn test_formula_chain() {
        let mut inputs = sheet(&[("A1", "2"), ("A2", "=A1*10"), ("A3", "=A2+A1")]);
        let expr = parse_expr("=A3-1").unwrap();
        assert_eq!(evaluate(&expr, &mut inputs, EvalOptions::default()), Ok(Value::Number(21.0)));
    }

    #[test]
    fn test_sum_over_formulas() {
        let mut inputs = sheet(&[("A1", "1"), ("A2", "=A1+1"), ("A3", "=A2+1"), ("B1", "note")]);
        let expr = parse_expr("=sum(A1:B3)").unwrap();
        assert_eq!(evaluate(&expr, &mut inputs, EvalOptions::default()), Ok(Value::Number(6.0)));
    }

    #[test]
    fn test_relative_copy_keeps_absolute_anchor() {
        let mut expr = parse_expr("=A1*$C$1").unwrap();
        assert!(expr.apply_relative_offset(1, 0));
        assert_eq!(expr.to_string(), "(B1*$C$1)");

        let mut inputs = sheet(&[("B1", "4"), ("C1", "2.5")]);
        assert_eq!(evaluate(&expr, &mut inputs, EvalOptions::default()), Ok(Value::Number(10.0)));
    }

    #[test]
    fn test_parse_failures_are_errors_not_values() {
        assert!(matches!(parse_expr("=A1+"), Err(ParseError::UnexpectedEnd)));
        assert!(matches!(parse_expr("=nope(A1:A2)"), Err(ParseError::UnknownFunction(_))));
        assert!(matches!(parse_expr("=A+1"), Err(ParseError::InvalidReference(_))));
    }
}
