//! Plain-text PNM codec.
//!
//! Layout: magic (`P2` grayscale, `P3` RGB), width, height, max value, then
//! `width * height * channels` samples. Tokens are whitespace separated and
//! `#` starts a comment running to the end of the line. Writing emits the
//! magic, `width height` and max value on their own lines, followed by one
//! sample per line.

use core::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;
use ps_core::{PixelBuffer, PixelFormat};

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    BadMagic(String),
    MissingToken(&'static str),
    BadToken { what: &'static str, token: String },
    Image(ps_core::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::BadMagic(m) => write!(f, "unsupported magic '{m}' (expected P2 or P3)"),
            Self::MissingToken(what) => write!(f, "unexpected end of file reading {what}"),
            Self::BadToken { what, token } => write!(f, "invalid {what}: '{token}'"),
            Self::Image(e) => write!(f, "invalid image: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ps_core::Error> for Error {
    fn from(e: ps_core::Error) -> Self {
        Self::Image(e)
    }
}

struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    fn next_token(&mut self) -> Option<&'a str> {
        loop {
            self.rest = self.rest.trim_start();
            if let Some(comment) = self.rest.strip_prefix('#') {
                self.rest = comment.split_once('\n').map_or("", |(_, tail)| tail);
                continue;
            }
            if self.rest.is_empty() {
                return None;
            }
            let end = self
                .rest
                .find(|c: char| c.is_whitespace() || c == '#')
                .unwrap_or(self.rest.len());
            let (token, tail) = self.rest.split_at(end);
            self.rest = tail;
            return Some(token);
        }
    }

    fn parse<T: core::str::FromStr>(&mut self, what: &'static str) -> Result<T, Error> {
        let token = self.next_token().ok_or(Error::MissingToken(what))?;
        token.parse().map_err(|_| Error::BadToken {
            what,
            token: token.to_string(),
        })
    }
}

pub fn read_pnm<R: Read>(mut reader: R) -> Result<PixelBuffer, Error> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let mut tokens = Tokens { rest: &text };

    let magic = tokens.next_token().ok_or(Error::MissingToken("magic"))?;
    let format = match magic {
        "P2" => PixelFormat::Gray,
        "P3" => PixelFormat::Rgb,
        other => return Err(Error::BadMagic(other.to_string())),
    };
    let width: usize = tokens.parse("width")?;
    let height: usize = tokens.parse("height")?;
    let max_value: u16 = tokens.parse("max value")?;

    let len = width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(format.channels()))
        .ok_or(Error::BadToken {
            what: "dimensions",
            token: format!("{width}x{height}"),
        })?;

    let mut samples = Vec::with_capacity(len);
    for _ in 0..len {
        samples.push(tokens.parse::<u16>("sample")?);
    }

    Ok(PixelBuffer::from_vec(format, width, height, max_value, samples)?)
}

pub fn write_pnm<W: Write>(mut writer: W, img: &PixelBuffer) -> Result<(), Error> {
    writeln!(writer, "{}", img.format().magic())?;
    writeln!(writer, "{} {}", img.width(), img.height())?;
    writeln!(writer, "{}", img.max_value())?;
    for v in img.samples() {
        writeln!(writer, "{v}")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load(path: &Path) -> Result<PixelBuffer, Error> {
    let file = File::open(path)?;
    let img = read_pnm(BufReader::new(file))?;
    debug!(
        "loaded {}: {} {}x{} max {}",
        path.display(),
        img.format().tag(),
        img.width(),
        img.height(),
        img.max_value()
    );
    Ok(img)
}

pub fn save(path: &Path, img: &PixelBuffer) -> Result<(), Error> {
    let file = File::create(path)?;
    write_pnm(BufWriter::new(file), img)
}

/// Whether `path` has a plain PNM extension.
pub fn is_pnm_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "pgm" | "ppm" | "pnm"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use ps_core::{PixelBuffer, PixelFormat};

    use super::{Error, is_pnm_path, read_pnm, write_pnm};

    #[test]
    fn reads_header_comments_and_samples() {
        let text = "P3\n# made by hand\n2 1 # inline\n255\n1 2 3\n4 5 6\n";
        let img = read_pnm(text.as_bytes()).expect("valid ppm");

        assert_eq!(img.format(), PixelFormat::Rgb);
        assert_eq!((img.width(), img.height(), img.max_value()), (2, 1, 255));
        assert_eq!(img.samples(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn writes_one_sample_per_line() {
        let img = PixelBuffer::from_vec(PixelFormat::Gray, 3, 1, 15, vec![0, 7, 15])
            .expect("valid");
        let mut out = Vec::new();
        write_pnm(&mut out, &img).expect("write");

        assert_eq!(String::from_utf8(out).expect("utf8"), "P2\n3 1\n15\n0\n7\n15\n");
    }

    #[test]
    fn written_file_reads_back() {
        let img = PixelBuffer::from_vec(PixelFormat::Rgb, 2, 2, 1000, (0..12).collect())
            .expect("valid");
        let mut out = Vec::new();
        write_pnm(&mut out, &img).expect("write");
        assert_eq!(read_pnm(out.as_slice()).expect("read"), img);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(read_pnm("P6 1 1 255 0".as_bytes()), Err(Error::BadMagic(_))));
        assert!(matches!(
            read_pnm("P2 2 2 255 1 2 3".as_bytes()),
            Err(Error::MissingToken("sample"))
        ));
        assert!(matches!(
            read_pnm("P2 x 2 255".as_bytes()),
            Err(Error::BadToken { what: "width", .. })
        ));
        assert!(matches!(
            read_pnm("P2 1 1 10 11".as_bytes()),
            Err(Error::Image(ps_core::Error::SampleOutOfRange { .. }))
        ));
        assert!(matches!(read_pnm("".as_bytes()), Err(Error::MissingToken("magic"))));
    }

    #[test]
    fn pnm_extensions() {
        assert!(is_pnm_path(Path::new("a/b.PGM")));
        assert!(is_pnm_path(Path::new("x.ppm")));
        assert!(!is_pnm_path(Path::new("x.png")));
        assert!(!is_pnm_path(Path::new("noext")));
    }
}
