use std::collections::BTreeSet;

use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::Term;

/// OR of exact term queries, one per distinct token. Tokens are expected to
/// come from [`crate::tantivy_utils::lexical_tokens`], so no query parsing
/// happens and user punctuation can never produce a syntax error.
pub fn token_query(field: Field, tokens: &[String]) -> Option<BooleanQuery> {
	let distinct: BTreeSet<&str> = tokens.iter().map(String::as_str).filter(|t| !t.is_empty()).collect();
	if distinct.is_empty() { return None; }
	let clauses: Vec<(Occur, Box<dyn Query>)> = distinct
		.into_iter()
		.map(|t| {
			let q: Box<dyn Query> = Box::new(TermQuery::new(Term::from_field_text(field, t), IndexRecordOption::WithFreqs));
			(Occur::Should, q)
		})
		.collect();
	Some(BooleanQuery::new(clauses))
}
