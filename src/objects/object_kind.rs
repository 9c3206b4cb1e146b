use std::io::BufRead;

/// The closed set of persisted object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }

    /// Consume the `<kind> <size>\0` framing header and return the kind,
    /// leaving the reader positioned at the object content.
    pub fn parse_header(reader: &mut impl BufRead) -> anyhow::Result<ObjectKind> {
        let mut kind = Vec::new();
        reader.read_until(b' ', &mut kind)?;

        let kind = String::from_utf8(kind)?;
        let kind = kind.trim();

        // skip the size part
        let mut size = Vec::new();
        reader.read_until(b'\0', &mut size)?;

        ObjectKind::try_from(kind)
    }
}

impl TryFrom<&str> for ObjectKind {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        match value {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            _ => Err(anyhow::anyhow!("invalid object kind: {value}")),
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_framing_header() {
        let mut reader = Cursor::new(b"tree 42\0rest".to_vec());
        assert_eq!(ObjectKind::parse_header(&mut reader).unwrap(), ObjectKind::Tree);

        let mut rest = Vec::new();
        std::io::Read::read_to_end(&mut reader, &mut rest).unwrap();
        assert_eq!(rest, b"rest");
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(ObjectKind::try_from("tag").is_err());
    }
}
