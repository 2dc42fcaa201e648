use std::fs;
use std::path::Path;
use std::str::FromStr;
use log::info;
use crate::config::GridSettings;
use crate::error::{Error, Result};
use crate::geometry::Vec3;
use crate::patch::{CartesianPatch, CARTESIAN_TYPE_CODE};
use crate::patch_grid::PatchGrid;




/**
 * The kinds of patches a grid description file can hold.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchType {
    Cartesian,
}

impl PatchType {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            CARTESIAN_TYPE_CODE => Some(PatchType::Cartesian),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            PatchType::Cartesian => CARTESIAN_TYPE_CODE,
        }
    }
}




struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {

    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn line(&self) -> usize {
        self.text[..self.pos].matches('\n').count() + 1
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::GridFile { line: self.line(), message: message.into() }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.text[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos == self.text.len()
    }

    fn token(&mut self) -> &'a str {
        self.skip_whitespace();
        let rest = &self.text[self.pos..];
        let len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    /**
     * Return the text up to the delimiter, and move past the delimiter.
     */
    fn take_until(&mut self, delimiter: char) -> Option<&'a str> {
        let rest = &self.text[self.pos..];
        let len = rest.find(delimiter)?;
        self.pos += len + delimiter.len_utf8();
        Some(&rest[..len])
    }
}




/**
 * The whitespace-separated parameters between the braces of one record.
 */
struct Parameters<'a> {
    tokens: std::str::SplitWhitespace<'a>,
    line: usize,
}

impl<'a> Parameters<'a> {

    fn next<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.tokens.next().ok_or_else(|| Error::GridFile {
            line: self.line,
            message: format!("missing {}", what),
        })?;
        token.parse().map_err(|_| Error::GridFile {
            line: self.line,
            message: format!("bad {}: '{}'", what, token),
        })
    }

    fn vec3(&mut self, what: &str) -> Result<Vec3> {
        Ok(Vec3::new(self.next(what)?, self.next(what)?, self.next(what)?))
    }

    fn finish(mut self) -> Result<()> {
        match self.tokens.next() {
            None => Ok(()),
            Some(token) => Err(Error::GridFile {
                line: self.line,
                message: format!("unexpected parameter '{}'", token),
            }),
        }
    }
}




/**
 * Read the Cartesian parameters: origin, i and j base vectors, cell counts,
 * the six per-face protection layer counts, and the physical lengths.
 */
fn parse_cartesian(mut p: Parameters, comment: &str, io_scale: f64) -> Result<CartesianPatch> {
    let origin = p.vec3("origin")?;
    let base_i = p.vec3("base vector i")?;
    let base_j = p.vec3("base vector j")?;
    let ni: usize = p.next("cell count")?;
    let nj: usize = p.next("cell count")?;
    let nk: usize = p.next("cell count")?;
    let mut protect = [0; 6];

    for x in &mut protect {
        *x = p.next("protection layer count")?;
    }
    let lengths = p.vec3("length")?;
    let line = p.line;
    p.finish()?;

    let bad = |message: &str| Error::GridFile { line, message: message.to_string() };
    let cross = Vec3::new(
        base_i.y * base_j.z - base_i.z * base_j.y,
        base_i.z * base_j.x - base_i.x * base_j.z,
        base_i.x * base_j.y - base_i.y * base_j.x);

    if ni == 0 || nj == 0 || nk == 0 {
        return Err(bad("cell counts must be positive"));
    }
    if cross.norm() == 0.0 {
        return Err(bad("base vectors must be non-zero and not parallel"));
    }
    if lengths.x <= 0.0 || lengths.y <= 0.0 || lengths.z <= 0.0 {
        return Err(bad("lengths must be positive"));
    }

    let mut patch = CartesianPatch::new();
    patch.set_comment(comment);
    patch.set_transform(origin * io_scale, base_i, base_j);
    patch.resize(ni, nj, nk);
    patch.set_num_protect_exception(protect[0], protect[1], protect[2], protect[3], protect[4], protect[5]);
    patch.setup_metrics(lengths.x * io_scale, lengths.y * io_scale, lengths.z * io_scale);
    Ok(patch)
}




/**
 * Build a patch grid from the text of a grid description. Each record is
 * a patch type code, a free comment up to `{`, and the patch parameters up
 * to the matching `}`. A type code of 0, or the end of the text, ends the
 * grid.
 */
pub fn parse_grid(text: &str, settings: GridSettings) -> Result<PatchGrid> {
    let io_scale = settings.io_scale;
    let mut grid = PatchGrid::new(settings);
    let mut scanner = Scanner::new(text);

    while !scanner.at_end() {
        let token = scanner.token();
        let code: u32 = token
            .parse()
            .map_err(|_| scanner.error(format!("bad patch type code '{}'", token)))?;

        if code == 0 {
            break;
        }
        let patch_type = PatchType::from_code(code).ok_or(Error::UnknownPatchType(code))?;
        let comment = scanner.take_until('{').ok_or_else(|| scanner.error("missing '{'"))?;
        let line = scanner.line();
        let body = scanner.take_until('}').ok_or_else(|| scanner.error("missing '}'"))?;
        let parameters = Parameters { tokens: body.split_whitespace(), line };

        let patch = match patch_type {
            PatchType::Cartesian => parse_cartesian(parameters, comment, io_scale)?,
        };
        grid.insert_patch(patch);
    }
    Ok(grid)
}




/**
 * Read a grid description file.
 */
pub fn read_grid<P: AsRef<Path>>(path: P, settings: GridSettings) -> Result<PatchGrid> {
    let text = fs::read_to_string(path.as_ref())?;
    let grid = parse_grid(&text, settings)?;
    info!("read {} patches from {}", grid.num_patches(), path.as_ref().display());
    Ok(grid)
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{parse_grid, read_grid, PatchType};
    use crate::config::GridSettings;
    use crate::error::Error;
    use crate::geometry::{Face, Vec3};

    const TWO_BLOCKS: &str = "
1001 left block
{
    0 0 0    1 0 0    0 1 0
    10 10 10
    2 2 2 2 2 2
    1.0 1.0 1.0
}
1001 right block {
    0.6 0 0  1 0 0  0 1 0
    10 10 10
    2 2 2 2 2 2
    1.0 1.0 1.0
}
0
1001 ignored { }
";

    #[test]
    fn cartesian_records_become_patches() {
        let grid = parse_grid(TWO_BLOCKS, GridSettings::default()).unwrap();
        assert_eq!(grid.num_patches(), 2);
        assert_eq!(grid.patch(0).comment(), "left block");
        assert_eq!(grid.patch(1).comment(), "right block");
        assert_eq!(grid.patch(1).dim(), (10, 10, 10));
        assert_eq!(grid.patch(1).type_code(), PatchType::Cartesian.code());
        assert!((grid.patch(1).xyzo_cell(0) - Vec3::new(0.65, 0.05, 0.05)).norm() < 1e-12);
    }

    #[test]
    fn grid_files_are_read_and_usable() {
        let path = std::env::temp_dir().join("patchgrid_two_blocks.grid");
        std::fs::write(&path, TWO_BLOCKS).unwrap();
        let mut grid = read_grid(&path, GridSettings::default()).unwrap();
        let report = grid.compute_dependencies().unwrap();
        assert_eq!(report.donor_edges, 2);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn lengths_and_origin_are_scaled() {
        let text = "1001 scaled { 1 0 0  1 0 0  0 1 0  4 2 1  0 1 0 1 0 0  2 1 0.5 }";
        let settings = GridSettings { io_scale: 0.5, ..GridSettings::default() };
        let grid = parse_grid(text, settings).unwrap();
        let patch = grid.patch(0);
        assert_eq!(patch.lengths(), Vec3::new(1.0, 0.5, 0.25));
        assert_eq!(patch.num_protect_layers(Face::IMax), 1);
        assert_eq!(patch.num_protect_layers(Face::JMax), 1);
        assert_eq!(patch.num_protect_layers(Face::IMin), 0);
        assert!((patch.xyzo_cell(0) - Vec3::new(0.625, 0.125, 0.125)).norm() < 1e-12);
    }

    #[test]
    fn rotated_base_vectors_are_honored() {
        let text = "1001 { 0 0 0  0 2 0  -1 0 0  2 2 2  0 0 0 0 0 0  1 1 1 }";
        let grid = parse_grid(text, GridSettings::default()).unwrap();
        let patch = grid.patch(0);
        let last = patch.cell(1, 1, 1);
        assert!((patch.xyzo_cell(last) - Vec3::new(-0.75, 0.75, 0.75)).norm() < 1e-12);
    }

    #[test]
    fn unknown_type_codes_are_fatal() {
        assert!(matches!(
            parse_grid("1010 unstructured { }", GridSettings::default()),
            Err(Error::UnknownPatchType(1010))));
    }

    #[test]
    fn malformed_records_report_their_line() {
        let text = "1001 broken\n{\n 0 0 0 1 0 0 0 1 0\n ten 10 10 }";
        match parse_grid(text, GridSettings::default()) {
            Err(Error::GridFile { line, .. }) => assert_eq!(line, 2),
            _ => panic!("expected a grid file error"),
        }
        assert!(matches!(
            parse_grid("1001 open { 0 0 0", GridSettings::default()),
            Err(Error::GridFile { .. })));
        assert!(matches!(
            parse_grid("1001 { 0 0 0 1 0 0 0 1 0 0 1 1 0 0 0 0 0 0 1 1 1 }", GridSettings::default()),
            Err(Error::GridFile { .. })));
        assert!(matches!(
            parse_grid("1001 { 0 0 0 1 0 0 0 1 0 1 1 1 0 0 0 0 0 0 1 1 1 7 }", GridSettings::default()),
            Err(Error::GridFile { .. })));
        assert!(matches!(
            parse_grid("x", GridSettings::default()),
            Err(Error::GridFile { line: 1, .. })));
    }
}
