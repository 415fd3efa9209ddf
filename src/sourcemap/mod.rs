//! Source map (revision 3) model
//!
//! Maps are held decoded, one segment list per generated line, so they can
//! be shifted, concatenated and composed cheaply while an artifact is built.
//! Only segments that point at a source are kept. The JSON form is read and
//! written through `oxc_sourcemap`.

use base64::Engine;
use oxc_sourcemap::SourceMapBuilder;
use serde::Deserialize;

/// One mapping from a generated column to an original position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: u32,
    pub source: u32,
    pub original_line: u32,
    pub original_column: u32,
    pub name: Option<u32>,
}

/// A decoded source map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    pub file: Option<String>,
    pub sources: Vec<String>,
    pub sources_content: Vec<Option<String>>,
    pub names: Vec<String>,
    /// Segments per generated line, ordered by column
    pub lines: Vec<Vec<Segment>>,
}

/// Header fields checked before the mappings are decoded
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapHeader {
    version: u8,
    #[serde(default)]
    source_root: Option<String>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map pointing each line of `content` at column 0 of the same line
    pub fn identity(source: &str, content: &str) -> Self {
        let mut map = Self::new();
        let index = map.add_source(source, Some(content.to_string()));
        let line_count = content.split('\n').count();
        map.lines = (0..line_count as u32)
            .map(|line| {
                vec![Segment {
                    generated_column: 0,
                    source: index,
                    original_line: line,
                    original_column: 0,
                    name: None,
                }]
            })
            .collect();
        map
    }

    /// Parse a JSON source map; `sourceRoot` is folded into each source
    pub fn from_json(json: &str) -> Result<Self, String> {
        let header: MapHeader = serde_json::from_str(json).map_err(|e| e.to_string())?;
        if header.version != 3 {
            return Err(format!("unsupported source map version {}", header.version));
        }
        let decoded = oxc_sourcemap::SourceMap::from_json_string(json).map_err(|e| e.to_string())?;
        let mut map = Self::from_oxc(&decoded)?;

        if let Some(root) = header.source_root.filter(|r| !r.is_empty()) {
            let root = if root.ends_with('/') { root } else { format!("{}/", root) };
            map.map_sources(|source| format!("{}{}", root, source));
        }
        Ok(map)
    }

    /// Convert a map produced by the oxc code generator
    pub fn from_oxc(map: &oxc_sourcemap::SourceMap) -> Result<Self, String> {
        let sources: Vec<String> = map.get_sources().map(|s| s.to_string()).collect();
        let sources_content = (0..sources.len() as u32)
            .map(|id| map.get_source_content(id).map(|c| c.to_string()))
            .collect();
        let names: Vec<String> = map.get_names().map(|n| n.to_string()).collect();

        let mut lines: Vec<Vec<Segment>> = Vec::new();
        for token in map.get_tokens() {
            let Some(source) = token.get_source_id() else {
                continue;
            };
            if source as usize >= sources.len() {
                return Err(format!("source index {} out of range", source));
            }
            let name = token.get_name_id().filter(|&n| (n as usize) < names.len());

            let line = token.get_dst_line() as usize;
            if lines.len() <= line {
                lines.resize(line + 1, Vec::new());
            }
            lines[line].push(Segment {
                generated_column: token.get_dst_col(),
                source,
                original_line: token.get_src_line(),
                original_column: token.get_src_col(),
                name,
            });
        }
        for segments in &mut lines {
            segments.sort_by_key(|s| s.generated_column);
        }

        Ok(Self {
            file: map.get_file().map(|f| f.to_string()),
            sources,
            sources_content,
            names,
            lines,
        })
    }

    fn to_oxc(&self) -> oxc_sourcemap::SourceMap {
        let mut builder = SourceMapBuilder::default();
        if let Some(file) = &self.file {
            builder.set_file(file);
        }
        let source_ids: Vec<u32> = self
            .sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                let content = self.sources_content.get(i).cloned().flatten().unwrap_or_default();
                builder.add_source_and_content(source, &content)
            })
            .collect();
        let name_ids: Vec<u32> = self.names.iter().map(|n| builder.add_name(n)).collect();

        for (line, segments) in self.lines.iter().enumerate() {
            for segment in segments {
                builder.add_token(
                    line as u32,
                    segment.generated_column,
                    segment.original_line,
                    segment.original_column,
                    source_ids.get(segment.source as usize).copied(),
                    segment.name.and_then(|n| name_ids.get(n as usize).copied()),
                );
            }
        }
        builder.into_sourcemap()
    }

    pub fn to_json(&self) -> String {
        self.to_oxc().to_json_string()
    }

    /// `data:` URL holding the JSON map
    pub fn to_data_url(&self) -> String {
        format!(
            "data:application/json;charset=utf-8;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(self.to_json())
        )
    }

    /// Register a source, reusing an existing entry with the same name
    pub fn add_source(&mut self, source: &str, content: Option<String>) -> u32 {
        if let Some(index) = self.sources.iter().position(|s| s == source) {
            if self.sources_content[index].is_none() {
                self.sources_content[index] = content;
            }
            return index as u32;
        }
        self.sources.push(source.to_string());
        self.sources_content.push(content);
        (self.sources.len() - 1) as u32
    }

    fn add_name(&mut self, name: &str) -> u32 {
        if let Some(index) = self.names.iter().position(|n| n == name) {
            return index as u32;
        }
        self.names.push(name.to_string());
        (self.names.len() - 1) as u32
    }

    /// Copy `other` into this map with its line 0 placed at `line_offset`
    pub fn append(&mut self, other: &SourceMap, line_offset: u32) {
        let source_table: Vec<u32> = other
            .sources
            .iter()
            .enumerate()
            .map(|(i, s)| self.add_source(s, other.sources_content.get(i).cloned().flatten()))
            .collect();
        let name_table: Vec<u32> = other.names.iter().map(|n| self.add_name(n)).collect();

        let needed = line_offset as usize + other.lines.len();
        if self.lines.len() < needed {
            self.lines.resize(needed, Vec::new());
        }

        for (i, segments) in other.lines.iter().enumerate() {
            let target = &mut self.lines[line_offset as usize + i];
            for segment in segments {
                target.push(Segment {
                    source: source_table[segment.source as usize],
                    name: segment.name.map(|n| name_table[n as usize]),
                    ..*segment
                });
            }
        }
    }

    /// Shift every mapping down by `count` unmapped lines
    pub fn prepend_lines(&mut self, count: usize) {
        let mut lines = vec![Vec::new(); count];
        lines.append(&mut self.lines);
        self.lines = lines;
    }

    /// Trace this map through `inner`
    ///
    /// `self` maps generated code to positions in an intermediate text and
    /// `inner` maps that text to its sources; the result maps the generated
    /// code straight to those sources. Positions `inner` does not cover are
    /// dropped.
    pub fn compose(&self, inner: &SourceMap) -> SourceMap {
        let lines = self
            .lines
            .iter()
            .map(|segments| {
                segments
                    .iter()
                    .filter_map(|segment| {
                        let traced = inner
                            .lookup(segment.original_line, segment.original_column)
                            .or_else(|| inner.lookup_line(segment.original_line))?;
                        Some(Segment {
                            generated_column: segment.generated_column,
                            ..*traced
                        })
                    })
                    .collect()
            })
            .collect();

        SourceMap {
            file: self.file.clone(),
            sources: inner.sources.clone(),
            sources_content: inner.sources_content.clone(),
            names: inner.names.clone(),
            lines,
        }
    }

    /// Rewrite source names (e.g. to make them relative to the output directory)
    pub fn map_sources<F: FnMut(&str) -> String>(&mut self, mut f: F) {
        for source in &mut self.sources {
            *source = f(source);
        }
    }

    /// First mapping on a generated line
    pub fn lookup_line(&self, line: u32) -> Option<&Segment> {
        self.lines.get(line as usize).and_then(|s| s.first())
    }

    /// The mapping covering a generated position: the last segment on `line`
    /// starting at or before `column`
    pub fn lookup(&self, line: u32, column: u32) -> Option<&Segment> {
        self.lines
            .get(line as usize)?
            .iter()
            .take_while(|s| s.generated_column <= column)
            .last()
    }
}
