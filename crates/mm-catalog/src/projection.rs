//! Projection of query matches onto the local catalog
//!
//! Author: hephaex@gmail.com

use crate::catalog::MovieCatalog;
use mm_core::{Match, MmError, Result};
use serde::Serialize;

/// A match joined with its movie, ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub year: i32,
    pub title: String,
    pub genre: String,
    pub director: String,
    pub nationality: String,
    pub synopsis: String,
    pub score: f32,
    pub wiki_url: String,
}

/// Join each match with its catalog entry, keeping the match order
///
/// Every id must parse as an integer and exist in the catalog; the index
/// is expected to hold only ids that came from the same dataset.
pub fn project(matches: &[Match], catalog: &MovieCatalog) -> Result<Vec<DisplayRow>> {
    matches
        .iter()
        .map(|m| {
            let id: u64 = m.id.parse().map_err(|_| {
                MmError::ValidationError(format!("Match id '{}' is not a movie id", m.id))
            })?;
            let movie = catalog
                .get(id)
                .ok_or_else(|| MmError::NotFound(format!("Movie {id} is not in the catalog")))?;

            Ok(DisplayRow {
                year: movie.year,
                title: movie.title.clone(),
                genre: movie.genre.clone(),
                director: movie.director.clone(),
                nationality: movie.nationality.clone(),
                synopsis: movie.plot.clone(),
                score: m.score,
                wiki_url: movie.wiki_url.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::SAMPLE;

    fn catalog() -> MovieCatalog {
        MovieCatalog::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_projection_keeps_order_and_scores() {
        let matches = vec![Match::new("5", 0.91), Match::new("12", 0.80)];
        let rows = project(&matches, &catalog()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "Title A");
        assert_eq!(rows[0].year, 1999);
        assert_eq!(rows[0].score, 0.91);
        assert_eq!(rows[1].title, "Title B");
        assert_eq!(rows[1].year, 2005);
        assert_eq!(rows[1].score, 0.80);
    }

    #[test]
    fn test_projection_does_not_resort_or_dedupe() {
        let matches = vec![
            Match::new("12", 0.5),
            Match::new("5", 0.9),
            Match::new("12", 0.5),
        ];
        let rows = project(&matches, &catalog()).unwrap();

        let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Title B", "Title A", "Title B"]);
    }

    #[test]
    fn test_empty_matches() {
        assert!(project(&[], &catalog()).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_id() {
        let err = project(&[Match::new("99", 0.7)], &catalog()).unwrap_err();
        assert!(matches!(err, MmError::NotFound(_)));
    }

    #[test]
    fn test_non_integer_id() {
        let err = project(&[Match::new("movie-5", 0.7)], &catalog()).unwrap_err();
        assert!(matches!(err, MmError::ValidationError(_)));
    }
}
