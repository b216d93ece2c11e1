use serde::Deserialize;

/// Which transformation a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// Remove the output tree.
    Clean,
    /// Sass/SCSS compilation.
    Style,
    /// Script bundling: concatenate a file-set into one artifact.
    Concat,
    /// Copy files, skipping unchanged ones.
    Copy,
    /// Render template pages.
    Template,
    /// Delegate to an external shell command.
    Command,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Clean => "clean",
            UnitKind::Style => "style",
            UnitKind::Concat => "concat",
            UnitKind::Copy => "copy",
            UnitKind::Template => "template",
            UnitKind::Command => "command",
        }
    }

    /// Units that read a file-set (and are therefore watchable by default).
    pub fn reads_file_set(&self) -> bool {
        matches!(
            self,
            UnitKind::Style | UnitKind::Concat | UnitKind::Copy | UnitKind::Template
        )
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output formatting for compiled style sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StyleOutput {
    #[default]
    Compressed,
    Expanded,
}

/// Where `deploy` publishes the output tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublishKind {
    #[default]
    Git,
    Directory,
}
