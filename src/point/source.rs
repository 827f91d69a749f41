//! Build-time point input and preparation

use crate::core::error::Error;
use crate::core::types::{DVec3, Result};
use crate::point::accessor::{PointAccessor, PointRecord};
use crate::point::records::bounds_of;
use crate::point::schema::PointSchema;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Producer of raw points for the octree builder
pub trait PointSource {
    type Point: PointRecord;

    /// Schema of the records this source produces
    fn schema(&self) -> PointSchema {
        <Self::Point as PointRecord>::SCHEMA
    }

    /// Read every point into memory
    fn read_points(&mut self) -> Result<Vec<Self::Point>>;
}

/// Transformations applied to raw points before building
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareOptions {
    /// Swap the Y and Z axes (Z-up scanner data into a Y-up scene)
    pub swap_yz: bool,
    /// Translate so the bounding box minimum lands on the origin
    pub recenter: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            swap_yz: false,
            recenter: true,
        }
    }
}

/// Apply `options` to every point in place.
///
/// # Returns
/// The translation that was subtracted from each position (zero when not
/// recentering or when `points` is empty). Adding it back restores the
/// original coordinates.
pub fn prepare_points<P: PointRecord>(points: &mut [P], options: &PrepareOptions) -> DVec3 {
    let acc = P::accessor();

    if options.swap_yz {
        for p in points.iter_mut() {
            let pos = acc.position64(p);
            acc.set_position64(p, DVec3::new(pos.x, pos.z, pos.y));
        }
    }

    if !options.recenter {
        return DVec3::ZERO;
    }

    let Some(bounds) = bounds_of(points) else {
        return DVec3::ZERO;
    };
    let offset = bounds.min;
    for p in points.iter_mut() {
        let pos = acc.position64(p);
        acc.set_position64(p, pos - offset);
    }
    offset
}

/// Whitespace separated ASCII points, one `x y z [intensity]` per line.
///
/// Blank lines and lines starting with `#` or `//` are skipped. Columns after
/// the intensity are ignored. The intensity is only stored when the record
/// type has an intensity field.
pub struct XyzSource<P> {
    path: PathBuf,
    _marker: PhantomData<P>,
}

impl<P: PointRecord> XyzSource<P> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            _marker: PhantomData,
        }
    }

    /// Get the input file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse points from any buffered reader
    pub fn parse<R: BufRead>(reader: R) -> Result<Vec<P>> {
        let acc = P::accessor();
        let mut points = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
                continue;
            }

            let mut columns = trimmed
                .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
                .filter(|c| !c.is_empty());
            let mut next = |name: &str| -> Result<Option<f64>> {
                match columns.next() {
                    None => Ok(None),
                    Some(text) => text.parse::<f64>().map(Some).map_err(|_| {
                        Error::InvalidInput(format!(
                            "line {}: invalid {} value '{}'",
                            line_no + 1,
                            name,
                            text
                        ))
                    }),
                }
            };

            let (Some(x), Some(y), Some(z)) = (next("x")?, next("y")?, next("z")?) else {
                return Err(Error::InvalidInput(format!(
                    "line {}: expected at least three coordinates",
                    line_no + 1
                )));
            };
            let intensity = next("intensity")?;

            let mut p = P::default();
            acc.set_position64(&mut p, DVec3::new(x, y, z));
            if let Some(i) = intensity {
                if acc.has_intensity16() {
                    acc.set_intensity16(&mut p, i.round().clamp(0.0, u16::MAX as f64) as u16);
                }
            }
            points.push(p);
        }

        Ok(points)
    }
}

impl<P: PointRecord> PointSource for XyzSource<P> {
    type Point = P;

    fn read_points(&mut self) -> Result<Vec<P>> {
        let file = File::open(&self.path)?;
        let points = Self::parse(BufReader::new(file))?;
        log::info!("Read {} points from {}", points.len(), self.path.display());
        Ok(points)
    }
}

/// Whether the first data line of an XYZ file carries an intensity column
pub fn xyz_has_intensity(path: impl AsRef<Path>) -> Result<bool> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            continue;
        }
        let columns = trimmed
            .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
            .filter(|c| !c.is_empty())
            .count();
        return Ok(columns >= 4);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::records::{Pos64, Pos64IShort};
    use std::io::{Cursor, Write};

    #[test]
    fn test_parse_xyz_with_intensity() {
        let text = "# header\n1.0 2.0 3.0 100\n\n4,5,6,70000\n-1 -2 -3\n";
        let points = XyzSource::<Pos64IShort>::parse(Cursor::new(text)).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].position, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(points[0].intensity, 100);
        assert_eq!(points[1].intensity, u16::MAX);
        assert_eq!(points[2].intensity, 0);
    }

    #[test]
    fn test_parse_ignores_intensity_without_field() {
        let points = XyzSource::<Pos64>::parse(Cursor::new("1 2 3 42 7 7\n")).unwrap();
        assert_eq!(points, vec![Pos64::new(DVec3::new(1.0, 2.0, 3.0))]);
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        let err = XyzSource::<Pos64>::parse(Cursor::new("1 2 3\n1 x 3\n")).unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let err = XyzSource::<Pos64>::parse(Cursor::new("1 2\n")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_read_points_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0 0 0 1").unwrap();
        writeln!(file, "10 20 30 2").unwrap();
        file.flush().unwrap();

        assert!(xyz_has_intensity(file.path()).unwrap());
        let mut source = XyzSource::<Pos64IShort>::new(file.path());
        assert_eq!(source.schema(), PointSchema::Pos64IShort);
        let points = source.read_points().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].intensity, 2);
    }

    #[test]
    fn test_prepare_swap_and_recenter() {
        let mut points = vec![
            Pos64::new(DVec3::new(100.0, 1.0, 50.0)),
            Pos64::new(DVec3::new(110.0, 3.0, 40.0)),
        ];
        let offset = prepare_points(
            &mut points,
            &PrepareOptions {
                swap_yz: true,
                recenter: true,
            },
        );
        assert_eq!(offset, DVec3::new(100.0, 40.0, 1.0));
        assert_eq!(points[0].position, DVec3::new(0.0, 10.0, 0.0));
        assert_eq!(points[1].position, DVec3::new(10.0, 0.0, 2.0));
    }

    #[test]
    fn test_prepare_without_recenter_keeps_coordinates() {
        let mut points = vec![Pos64::new(DVec3::new(5.0, 6.0, 7.0))];
        let offset = prepare_points(
            &mut points,
            &PrepareOptions {
                swap_yz: false,
                recenter: false,
            },
        );
        assert_eq!(offset, DVec3::ZERO);
        assert_eq!(points[0].position, DVec3::new(5.0, 6.0, 7.0));

        let mut empty: Vec<Pos64> = Vec::new();
        assert_eq!(prepare_points(&mut empty, &PrepareOptions::default()), DVec3::ZERO);
    }
}
