//! Output utilities for CLI tools.

use serde::Serialize;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// YAML format (default).
    #[default]
    Yaml,
    /// JSON format.
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json { OutputFormat::Json } else { OutputFormat::Yaml }
    }
}

/// Output configuration.
pub struct Output {
    pub format: OutputFormat,
    pub file: Option<String>,
}

impl Output {
    /// Creates a new output configuration.
    pub fn new(format: OutputFormat, file: Option<String>) -> Self {
        Self { format, file }
    }

    /// Renders a value in the configured format.
    pub fn render<T: Serialize>(&self, value: &T) -> anyhow::Result<String> {
        Ok(match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
            OutputFormat::Json => serde_json::to_string_pretty(value)? + "\n",
        })
    }

    /// Writes the rendered value to the output file, or stdout.
    pub fn write<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let output = self.render(value)?;
        match &self.file {
            Some(path) => std::fs::write(path, output)?,
            None => print!("{}", output),
        }
        Ok(())
    }
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        id: &'static str,
        count: usize,
    }

    #[test]
    fn test_render_formats() {
        let row = Row { id: "c1", count: 3 };

        let yaml = Output::new(OutputFormat::Yaml, None).render(&row).unwrap();
        assert!(yaml.contains("id: c1"));

        let json = Output::new(OutputFormat::from_json_flag(true), None)
            .render(&row)
            .unwrap();
        assert!(json.contains("\"count\": 3"));
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        let out = Output::new(OutputFormat::Yaml, path.to_str().map(String::from));
        out.write(&Row { id: "c1", count: 1 }).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("count: 1"));
    }
}
