/// File-mode attributes of a tree entry.
///
/// The persisted form is the git octal mode; non-directory modes apply to
/// blobs, `Directory` to subtrees.
#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd)]
pub enum EntryMode {
    #[default]
    Regular,
    Executable,
    Directory,
}

impl EntryMode {
    pub fn as_str(&self) -> &str {
        match self {
            EntryMode::Regular => "100644",
            EntryMode::Executable => "100755",
            EntryMode::Directory => "40000",
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }
}

impl TryFrom<&str> for EntryMode {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        match value {
            "100644" => Ok(EntryMode::Regular),
            "100755" => Ok(EntryMode::Executable),
            "40000" => Ok(EntryMode::Directory),
            _ => Err(anyhow::anyhow!("invalid entry mode: {value}")),
        }
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(EntryMode::Regular, "100644")]
    #[case(EntryMode::Executable, "100755")]
    #[case(EntryMode::Directory, "40000")]
    fn octal_round_trip(#[case] mode: EntryMode, #[case] text: &str) {
        assert_eq!(mode.as_str(), text);
        assert_eq!(EntryMode::try_from(text).unwrap(), mode);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(EntryMode::try_from("120000").is_err());
    }
}
