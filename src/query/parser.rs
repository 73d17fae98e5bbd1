use nom::bytes::complete::{tag, take_until};
use nom::character::complete::digit1;
use nom::combinator::{all_consuming, map_res};
use nom::sequence::{delimited, preceded};
use nom::IResult;

use crate::core::error::{Error, ErrorKind, Result};
use crate::index::trie::MAX_AUTOMATON_DISTANCE;
use crate::query::ast::{Fuzziness, Query, QueryTerm};

/// Parses the query grammar from §4.3:
///
///   query       := phrase_slop | bare
///   phrase_slop := '"' term_list '"' '~' uint
///   bare        := term_list
///   term_list   := term (WS term)*
///   term        := word ( '~' uint? )?
pub fn parse(input: &str) -> Result<Query> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid_query("empty query"));
    }

    let (term_list, slop) = if trimmed.starts_with('"') {
        let (phrase, slop) = phrase_slop(trimmed)
            .map(|(_, out)| out)
            .map_err(|_| invalid_query("unbalanced phrase quoting"))?;
        (phrase, Some(slop))
    } else {
        (trimmed, None)
    };

    let terms = term_list
        .split_whitespace()
        .map(parse_term)
        .collect::<Result<Vec<_>>>()?;

    if terms.is_empty() {
        return Err(invalid_query("empty query"));
    }

    Ok(Query { terms, slop })
}

fn phrase_slop(input: &str) -> IResult<&str, (&str, u32)> {
    all_consuming(|i| {
        let (i, phrase) = delimited(tag("\""), take_until("\""), tag("\""))(i)?;
        let (i, slop) = preceded(
            tag("~"),
            map_res(digit1, |s: &str| s.parse::<u32>()),
        )(i)?;
        Ok((i, (phrase, slop)))
    })(input)
}

fn parse_term(token: &str) -> Result<QueryTerm> {
    let (word, fuzziness) = match token.find('~') {
        None => (token, Fuzziness::Exact),
        Some(idx) => {
            let word = &token[..idx];
            let rest = &token[idx + 1..];
            let fuzziness = if rest.is_empty() {
                Fuzziness::MaxAvailable
            } else {
                let distance: u8 = rest
                    .parse()
                    .map_err(|_| invalid_query(format!("malformed fuzziness: {token}")))?;
                if distance > MAX_AUTOMATON_DISTANCE {
                    return Err(invalid_query(format!(
                        "fuzziness {distance} exceeds the highest compiled automaton distance {MAX_AUTOMATON_DISTANCE}"
                    )));
                }
                Fuzziness::Distance(distance)
            };
            (word, fuzziness)
        }
    };

    if word.is_empty() {
        return Err(invalid_query(format!("empty term in: {token}")));
    }

    Ok(QueryTerm {
        word: word.to_string(),
        fuzziness,
    })
}

fn invalid_query(context: impl Into<String>) -> Error {
    Error::new(ErrorKind::SearchQuery, context.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_query_has_unbounded_slop() {
        let q = parse("never told").unwrap();
        assert_eq!(q.slop, None);
        assert_eq!(q.terms.len(), 2);
        assert_eq!(q.terms[0].word, "never");
        assert_eq!(q.terms[0].fuzziness, Fuzziness::Exact);
    }

    #[test]
    fn phrase_slop_query_parses_bound() {
        let q = parse("\"never told\"~0").unwrap();
        assert_eq!(q.slop, Some(0));
        assert_eq!(q.terms.len(), 2);
    }

    #[test]
    fn canonical_rewrite_form_parses() {
        let q = parse("\"tald~1 happen~1\"~2").unwrap();
        assert_eq!(q.slop, Some(2));
        assert_eq!(q.terms[0].word, "tald");
        assert_eq!(q.terms[0].fuzziness, Fuzziness::Distance(1));
        assert_eq!(q.terms[1].word, "happen");
        assert_eq!(q.terms[1].fuzziness, Fuzziness::Distance(1));
    }

    #[test]
    fn trailing_tilde_with_no_digits_is_max_available() {
        let q = parse("tald~").unwrap();
        assert_eq!(q.terms[0].fuzziness, Fuzziness::MaxAvailable);
    }

    #[test]
    fn fuzziness_beyond_max_automaton_distance_is_invalid() {
        let err = parse("tald~4").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SearchQuery);
    }

    #[test]
    fn unbalanced_phrase_quoting_is_invalid() {
        let err = parse("\"never told~0").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SearchQuery);
    }

    #[test]
    fn empty_query_is_invalid() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
    }
}
