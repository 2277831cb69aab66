//! Built-in parser table.

use super::ParserDescriptor;

/// Id of the reference implementation.
pub const REFERENCE_ID: &str = "refparse";

/// Parsers shown by default, reference first.
pub const DEFAULT_VISIBLE: &[&str] = &["refparse", "pyyaml", "libyaml", "goyaml"];

/// The reference comes first; other entries keep their display order.
#[must_use]
pub fn parsers() -> Vec<ParserDescriptor> {
    vec![
        ParserDescriptor::new(
            REFERENCE_ID,
            "Reference Parser",
            "f00319457419feacddf743d75eb317dacf5caf4b",
            "JavaScript",
        )
        .with_repo("https://github.com/yaml/yaml-reference-parser"),
        ParserDescriptor::new("npmyaml", "eemeli/yaml", "2.8.2", "JavaScript")
            .with_repo("https://github.com/eemeli/yaml"),
        ParserDescriptor::new("libyaml", "libyaml", "0.2.5", "C")
            .with_repo("https://github.com/yaml/libyaml"),
        ParserDescriptor::new("pyyaml", "PyYAML", "6.0.3", "Python"),
        ParserDescriptor::new("ruamel", "ruamel.yaml", "0.18.17", "Python"),
        ParserDescriptor::new("goyaml", "go-yaml", "main", "Go")
            .with_repo("https://github.com/pantoniou/yaml"),
        ParserDescriptor::new("libfyaml", "libfyaml", "0.9.4", "C")
            .with_repo("https://github.com/pantoniou/libfyaml"),
        ParserDescriptor::new("rapid", "rapidyaml", "0.10.0", "C++")
            .with_repo("https://github.com/biojppm/rapidyaml"),
        ParserDescriptor::new("rustyaml", "serde-yaml", "0.9.34", "Rust")
            .with_repo("https://github.com/dtolnay/serde-yaml"),
        ParserDescriptor::new("snake", "SnakeYAML", "2.5", "Java")
            .with_repo("https://bitbucket.org/snakeyaml/snakeyaml"),
        ParserDescriptor::new("snakeeng", "SnakeYAML Engine", "3.0.1", "Java")
            .with_repo("https://bitbucket.org/snakeyaml/snakeyaml-engine"),
        ParserDescriptor::new("dotnet", "YamlDotNet", "16.3.0", "C#")
            .with_repo("https://github.com/aaubry/YamlDotNet"),
        ParserDescriptor::new("luayaml", "lyaml", "6.2.8", "Lua")
            .with_repo("https://github.com/gvvaughan/lyaml"),
        ParserDescriptor::new("nimyaml", "NimYAML", "2.2.1", "Nim")
            .with_repo("https://github.com/flyx/NimYAML"),
        ParserDescriptor::new("ppyaml", "YAML::PP", "0.039", "Perl"),
        ParserDescriptor::new("hsyaml", "HsYAML", "0.2.1.5", "Haskell")
            .with_repo("https://github.com/haskell-hvr/HsYAML"),
        ParserDescriptor::new(
            "refhs",
            "yamlreference",
            "bf471f804ccd014fcdded3a8c74c338df8f33c85",
            "Haskell",
        )
        .with_repo("https://github.com/orenbenkiki/yamlreference")
        .status_only(),
    ]
}
