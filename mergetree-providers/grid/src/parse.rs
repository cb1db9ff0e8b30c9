//! Text loading.
//!
//! The format is a `<width> <height>` header followed by `width * height`
//! whitespace-separated values in row-major order. Blank lines and lines
//! starting with `#` are ignored; line breaks inside the body are free-form.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use tracing::{debug, instrument};

use crate::{Connectivity, GridField, GridProviderError};

impl GridField {
    /// Parses a grid from `reader`.
    ///
    /// # Errors
    /// Returns [`GridProviderError`] when the header or a value is malformed,
    /// the value count disagrees with the header, or reading fails.
    ///
    /// # Examples
    /// ```
    /// use std::io::Cursor;
    ///
    /// use mergetree_providers_grid::{Connectivity, GridField};
    ///
    /// let raw = "# two by two\n2 2\n0 1\n3 2\n";
    /// let grid = GridField::try_from_reader("demo", Cursor::new(raw), Connectivity::Quad)
    ///     .expect("grid must parse");
    /// assert_eq!(grid.value_at(0, 1), Some(3.0));
    /// ```
    pub fn try_from_reader<R: BufRead>(
        name: impl Into<String>,
        reader: R,
        connectivity: Connectivity,
    ) -> Result<Self, GridProviderError> {
        let mut header = None;
        let mut values = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let content = line.trim();
            if content.is_empty() || content.starts_with('#') {
                continue;
            }
            let number = index + 1;
            if header.is_none() {
                let (width, height) = parse_header(number, content)?;
                values.reserve(width.saturating_mul(height));
                header = Some((width, height));
                continue;
            }
            for token in content.split_whitespace() {
                let value = token
                    .parse::<f64>()
                    .map_err(|_| GridProviderError::InvalidValue {
                        line: number,
                        token: token.to_owned(),
                    })?;
                values.push(value);
            }
        }
        let (width, height) = header.ok_or(GridProviderError::EmptyInput)?;
        let grid = Self::new(name, width, height, connectivity, values)?;
        debug!(name = grid.name(), width, height, "grid loaded");
        Ok(grid)
    }

    /// Opens and parses the grid stored at `path`.
    ///
    /// # Errors
    /// As [`GridField::try_from_reader`], plus [`GridProviderError::Io`] when
    /// the file cannot be opened.
    #[instrument(
        name = "grid.load",
        err,
        skip(name, path),
        fields(path = %path.as_ref().display()),
    )]
    pub fn try_from_path(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        connectivity: Connectivity,
    ) -> Result<Self, GridProviderError> {
        let file = File::open(path.as_ref())?;
        Self::try_from_reader(name, BufReader::new(file), connectivity)
    }
}

fn parse_header(line: usize, content: &str) -> Result<(usize, usize), GridProviderError> {
    let invalid = || GridProviderError::InvalidHeader {
        line,
        content: content.to_owned(),
    };
    let mut fields = content.split_whitespace();
    let (Some(width), Some(height), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(invalid());
    };
    let width = width.parse::<usize>().map_err(|_| invalid())?;
    let height = height.parse::<usize>().map_err(|_| invalid())?;
    Ok((width, height))
}
