//! Movie catalog loaded from the Wikipedia plots CSV
//!
//! Author: hephaex@gmail.com

use mm_core::{MmError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One movie from the dataset
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MovieRecord {
    pub id: u64,

    #[serde(rename = "Release Year")]
    pub year: i32,

    #[serde(rename = "Title")]
    pub title: String,

    #[serde(rename = "Origin/Ethnicity", default)]
    pub nationality: String,

    #[serde(rename = "Director", default)]
    pub director: String,

    #[serde(rename = "Genre", default)]
    pub genre: String,

    #[serde(rename = "Wiki Page", default)]
    pub wiki_url: String,

    #[serde(rename = "Plot", default)]
    pub plot: String,
}

/// Movies indexed by id, in file order
#[derive(Debug, Default)]
pub struct MovieCatalog {
    movies: Vec<MovieRecord>,
    by_id: HashMap<u64, usize>,
}

impl MovieCatalog {
    /// Load the catalog from a CSV file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            MmError::DatasetError(format!("Failed to open {}: {e}", path.display()))
        })?;

        let catalog = Self::from_reader(file)?;
        tracing::info!(path = %path.display(), movies = catalog.len(), "Loaded movie catalog");
        Ok(catalog)
    }

    /// Parse CSV with a header row
    ///
    /// Unknown columns (such as `Cast`) are ignored. A duplicated id keeps
    /// the first row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let mut catalog = Self::default();
        for (line, row) in csv_reader.deserialize::<MovieRecord>().enumerate() {
            let movie = row.map_err(|e| {
                MmError::DatasetError(format!("Invalid movie row {}: {e}", line + 1))
            })?;
            catalog.insert(movie);
        }

        Ok(catalog)
    }

    fn insert(&mut self, movie: MovieRecord) {
        if self.by_id.contains_key(&movie.id) {
            tracing::warn!(id = movie.id, "Duplicate movie id, keeping first row");
            return;
        }
        self.by_id.insert(movie.id, self.movies.len());
        self.movies.push(movie);
    }

    pub fn get(&self, id: u64) -> Option<&MovieRecord> {
        self.by_id.get(&id).map(|&i| &self.movies[i])
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MovieRecord> {
        self.movies.iter()
    }

    /// `(id, plot)` pairs ready for indexing
    pub fn plots(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.movies
            .iter()
            .map(|m| (m.id.to_string(), m.plot.clone()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const SAMPLE: &str = "\
Release Year,Title,Origin/Ethnicity,Director,Cast,Genre,Wiki Page,Plot,id
1999,Title A,American,Jane Doe,\"X, Y\",drama,https://en.wikipedia.org/wiki/Title_A,\"A man wakes up. He is late.\",5
2005,Title B,British,John Roe,,comedy,https://en.wikipedia.org/wiki/Title_B,A dog finds a hat.,12
";

    #[test]
    fn test_from_reader() {
        let catalog = MovieCatalog::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);

        let a = catalog.get(5).unwrap();
        assert_eq!(a.title, "Title A");
        assert_eq!(a.year, 1999);
        assert_eq!(a.nationality, "American");
        assert_eq!(a.plot, "A man wakes up. He is late.");

        assert!(catalog.get(7).is_none());
    }

    #[test]
    fn test_plots_preserve_file_order() {
        let catalog = MovieCatalog::from_reader(SAMPLE.as_bytes()).unwrap();
        let plots: Vec<_> = catalog.plots().collect();
        assert_eq!(plots[0].0, "5");
        assert_eq!(plots[1], ("12".to_string(), "A dog finds a hat.".to_string()));
    }

    #[test]
    fn test_duplicate_id_keeps_first() {
        let csv = format!("{SAMPLE}2010,Title C,Irish,Someone,,horror,url,Boo.,5\n");
        let catalog = MovieCatalog::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(5).unwrap().title, "Title A");
    }

    #[test]
    fn test_malformed_row() {
        let csv = "Release Year,Title,Plot,id\nnineteen,Title,Plot,1\n";
        let err = MovieCatalog::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, MmError::DatasetError(ref m) if m.contains("row 1")));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let catalog = MovieCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.iter().count(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = MovieCatalog::load("/nonexistent/movies.csv").unwrap_err();
        assert!(matches!(err, MmError::DatasetError(_)));
    }
}
