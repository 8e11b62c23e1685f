//! Stylesheet compiler seam and the sinks a compiler writes into.
//!
//! `TextCssCompiler` is a small reference writer built on `cssparser`. It
//! keeps style rules, flattens conditional group rules such as `@media`
//! into a per-rule condition, keeps `@font-face`/`@page` descriptors, and
//! skips other at-rules. Hosts with a real CSS pipeline plug in their own
//! `StyleCompiler`.

use crate::model::Document;
use crate::HostError;
use cssparser::{Delimiter, ParseError, ParseErrorKind, Parser, ParserInput, Token};
use localstyle_schema::{ClassName, ModuleName};
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

pub trait StyleCompiler {
    /// Compile a stylesheet document into the writer's serialized form.
    fn compile(&mut self, stylesheet: &Document, module: &ModuleName) -> Result<Vec<u8>, HostError>;
}

/// Interned string table shared by everything written for one module.
#[derive(Debug, Default)]
pub struct StringRegistry {
    ids: HashMap<String, u32>,
    strings: Vec<String>,
}

impl StringRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.ids.get(s) {
            return id;
        }
        let id = self.strings.len() as u32;
        self.strings.push(s.to_owned());
        self.ids.insert(s.to_owned(), id);
        id
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        self.strings.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Counts project component classes referenced from compiled styles.
#[derive(Debug, Default)]
pub struct ComponentReferenceCounter {
    references: BTreeMap<ClassName, usize>,
}

impl ComponentReferenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: ClassName) {
        *self.references.entry(class).or_insert(0) += 1;
    }

    pub fn count(&self, class: &ClassName) -> usize {
        self.references.get(class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.references.values().sum()
    }
}

/// Counts embedded assets referenced from compiled styles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AssetCounter {
    pub images: usize,
    pub swfs: usize,
}

impl AssetCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: &str) {
        if path.to_ascii_lowercase().ends_with(".swf") {
            self.swfs += 1;
        } else {
            self.images += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.images + self.swfs
    }
}

/// Mutable sinks borrowed by a compiler for the duration of a pass.
pub struct WriterSinks<'a> {
    pub strings: &'a mut StringRegistry,
    pub components: &'a mut ComponentReferenceCounter,
    pub assets: &'a mut AssetCounter,
}

pub struct TextCssCompiler<'a> {
    sinks: WriterSinks<'a>,
}

impl<'a> TextCssCompiler<'a> {
    pub fn new(sinks: WriterSinks<'a>) -> Self {
        Self { sinks }
    }
}

/// Condition id written for rules outside any conditional group.
pub const NO_CONDITION: u32 = u32::MAX;

impl StyleCompiler for TextCssCompiler<'_> {
    fn compile(&mut self, stylesheet: &Document, module: &ModuleName) -> Result<Vec<u8>, HostError> {
        let fail = |message: String| HostError::Compile {
            file: stylesheet.file.id.to_string(),
            message,
        };
        let rules = parse_rules(&stylesheet.text).map_err(fail)?;
        trace!(
            "compiling {} rules from {} for {module}",
            rules.len(),
            stylesheet.file
        );

        let rule_count = u16::try_from(rules.len())
            .map_err(|_| fail(format!("{} rules exceed the limit of {}", rules.len(), u16::MAX)))?;
        let mut declaration_counts = Vec::with_capacity(rules.len());
        for rule in &rules {
            let count = u16::try_from(rule.declarations.len()).map_err(|_| {
                fail(format!(
                    "rule '{}' has {} declarations, more than {}",
                    rule.selector,
                    rule.declarations.len(),
                    u16::MAX
                ))
            })?;
            declaration_counts.push(count);
        }

        // Layout: u16 rule count, then per rule u32 condition, u32 selector,
        // u16 declaration count, and u32 name/value pairs, all little endian
        // string ids.
        let mut out = Vec::new();
        out.extend_from_slice(&rule_count.to_le_bytes());
        for (rule, count) in rules.iter().zip(declaration_counts) {
            let condition = rule
                .condition
                .as_deref()
                .map_or(NO_CONDITION, |c| self.sinks.strings.intern(c));
            out.extend_from_slice(&condition.to_le_bytes());
            out.extend_from_slice(&self.sinks.strings.intern(&rule.selector).to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            for (name, value) in &rule.declarations {
                self.scan_value(value);
                out.extend_from_slice(&self.sinks.strings.intern(name).to_le_bytes());
                out.extend_from_slice(&self.sinks.strings.intern(value).to_le_bytes());
            }
        }
        Ok(out)
    }
}

impl TextCssCompiler<'_> {
    fn scan_value(&mut self, value: &str) {
        for reference in references(value) {
            match reference {
                Reference::Asset(path) => self.sinks.assets.record(&path),
                Reference::Component(class) => self.sinks.components.register(ClassName::new(class)),
            }
        }
    }
}

type CssError<'i> = ParseError<'i, String>;

struct Rule {
    condition: Option<String>,
    selector: String,
    declarations: Vec<(String, String)>,
}

fn parse_rules(text: &str) -> Result<Vec<Rule>, String> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    let mut rules = Vec::new();
    parse_rule_list(&mut parser, None, &mut rules).map_err(|e| describe(&e))?;
    Ok(rules)
}

fn describe(error: &CssError<'_>) -> String {
    let what = match &error.kind {
        ParseErrorKind::Custom(message) => message.clone(),
        ParseErrorKind::Basic(kind) => format!("{kind:?}"),
    };
    format!(
        "{what} at line {}, column {}",
        error.location.line + 1,
        error.location.column
    )
}

fn skip_rest<'i>(p: &mut Parser<'i, '_>) -> Result<(), CssError<'i>> {
    while p.next().is_ok() {}
    Ok(())
}

fn parse_rule_list<'i>(
    p: &mut Parser<'i, '_>,
    condition: Option<&str>,
    rules: &mut Vec<Rule>,
) -> Result<(), CssError<'i>> {
    loop {
        p.skip_whitespace();
        let start = p.position();
        let Ok(token) = p.next().cloned() else {
            return Ok(());
        };
        match token {
            Token::CDO | Token::CDC | Token::Semicolon => {}
            Token::AtKeyword(name) => parse_at_rule(p, &name, condition, rules)?,
            // A block without a selector is dropped, as browsers do.
            Token::CurlyBracketBlock => trace!("dropping rule without selector"),
            _ => {
                p.parse_until_before(Delimiter::CurlyBracketBlock, skip_rest)?;
                let selector = p.slice_from(start).trim().to_owned();
                if p.expect_curly_bracket_block().is_err() {
                    return Err(p.new_custom_error(format!(
                        "rule '{selector}' has no declaration block"
                    )));
                }
                let declarations = p.parse_nested_block(parse_declarations)?;
                rules.push(Rule {
                    condition: condition.map(str::to_owned),
                    selector,
                    declarations,
                });
            }
        }
    }
}

fn parse_at_rule<'i>(
    p: &mut Parser<'i, '_>,
    name: &str,
    condition: Option<&str>,
    rules: &mut Vec<Rule>,
) -> Result<(), CssError<'i>> {
    let prelude_start = p.position();
    p.parse_until_before(Delimiter::CurlyBracketBlock | Delimiter::Semicolon, skip_rest)?;
    let prelude = p.slice_from(prelude_start).trim();
    let header = if prelude.is_empty() {
        format!("@{name}")
    } else {
        format!("@{name} {prelude}")
    };
    if p.expect_curly_bracket_block().is_err() {
        trace!("skipping statement {header}");
        return Ok(());
    }

    match name.to_ascii_lowercase().as_str() {
        "media" | "supports" | "container" | "layer" | "document" | "-moz-document" => {
            let nested = match condition {
                Some(outer) => format!("{outer} {header}"),
                None => header,
            };
            p.parse_nested_block(|p| parse_rule_list(p, Some(&nested), rules))
        }
        "font-face" | "page" => {
            let declarations = p.parse_nested_block(parse_declarations)?;
            rules.push(Rule {
                condition: condition.map(str::to_owned),
                selector: header,
                declarations,
            });
            Ok(())
        }
        _ => {
            trace!("skipping {header} block");
            Ok(())
        }
    }
}

/// Declarations of one block. Invalid declarations are dropped and parsing
/// resumes after the next `;`.
fn parse_declarations<'i>(p: &mut Parser<'i, '_>) -> Result<Vec<(String, String)>, CssError<'i>> {
    let mut declarations = Vec::new();
    while !p.is_exhausted() {
        let parsed = p.parse_until_after(Delimiter::Semicolon, |p| {
            let name = p.expect_ident()?.to_string();
            p.expect_colon()?;
            let start = p.position();
            skip_rest(p)?;
            Ok::<_, CssError<'i>>((name, p.slice_from(start).trim().to_owned()))
        });
        match parsed {
            Ok(declaration) => declarations.push(declaration),
            Err(e) => trace!("dropping invalid declaration: {}", describe(&e)),
        }
    }
    Ok(declarations)
}

#[derive(Debug, PartialEq, Eq)]
enum Reference {
    Asset(String),
    Component(String),
}

/// Assets and class references named by `url(...)`, `Embed(...)` and
/// `ClassReference(...)` anywhere in a declaration value.
fn references(value: &str) -> Vec<Reference> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut found = Vec::new();
    if let Err(e) = collect_references(&mut parser, &mut found) {
        trace!("stopped scanning '{value}': {}", describe(&e));
    }
    found
}

fn collect_references<'i>(
    p: &mut Parser<'i, '_>,
    found: &mut Vec<Reference>,
) -> Result<(), CssError<'i>> {
    while let Ok(token) = p.next().cloned() {
        match token {
            Token::UnquotedUrl(url) => found.push(Reference::Asset(url.to_string())),
            Token::Function(name) => {
                let make: Option<fn(String) -> Reference> =
                    if name.eq_ignore_ascii_case("url") || name.eq_ignore_ascii_case("embed") {
                        Some(Reference::Asset)
                    } else if name.eq_ignore_ascii_case("classreference") {
                        Some(Reference::Component)
                    } else {
                        None
                    };
                p.parse_nested_block(|p| match make {
                    Some(make) => {
                        if let Some(arg) = first_argument(p) {
                            found.push(make(arg));
                        }
                        Ok(())
                    }
                    None => collect_references(p, found),
                })?;
            }
            Token::ParenthesisBlock | Token::SquareBracketBlock | Token::CurlyBracketBlock => {
                p.parse_nested_block(|p| collect_references(p, found))?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// The first quoted string of a function's arguments, or the whole unquoted
/// argument text. `null` names nothing.
fn first_argument(p: &mut Parser<'_, '_>) -> Option<String> {
    let start = p.position();
    while let Ok(token) = p.next() {
        if let Token::QuotedString(s) = token {
            return Some(s.to_string());
        }
    }
    let text = p.slice_from(start).trim();
    (!text.is_empty() && !text.eq_ignore_ascii_case("null")).then(|| text.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileRef;

    fn compile_text(text: &str) -> (Result<Vec<u8>, HostError>, StringRegistry, ComponentReferenceCounter, AssetCounter) {
        let mut strings = StringRegistry::new();
        let mut components = ComponentReferenceCounter::new();
        let mut assets = AssetCounter::new();
        let doc = Document::stylesheet(FileRef::new("src/a.css"), text);
        let result = {
            let mut compiler = TextCssCompiler::new(WriterSinks {
                strings: &mut strings,
                components: &mut components,
                assets: &mut assets,
            });
            compiler.compile(&doc, &ModuleName::new("app"))
        };
        (result, strings, components, assets)
    }

    fn selectors(text: &str) -> Vec<(Option<String>, String)> {
        parse_rules(text)
            .unwrap()
            .into_iter()
            .map(|r| (r.condition, r.selector))
            .collect()
    }

    fn u32_at(data: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
    }

    #[test]
    fn interning_is_stable() {
        let mut reg = StringRegistry::new();
        let a = reg.intern("color");
        let b = reg.intern("fontSize");
        assert_eq!(reg.intern("color"), a);
        assert_ne!(a, b);
        assert_eq!(reg.get(b), Some("fontSize"));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn compiles_rules_into_string_ids() {
        let (result, strings, _, _) =
            compile_text("Button { color: red; fontSize: 12 }\n.title { color: blue; }");
        let data = result.unwrap();
        assert_eq!(u16::from_le_bytes([data[0], data[1]]), 2);
        assert_eq!(u32_at(&data, 2), NO_CONDITION);
        assert_eq!(strings.get(u32_at(&data, 6)), Some("Button"));
        // "color" is interned once for both rules
        assert_eq!(strings.len(), 7);
    }

    #[test]
    fn counts_assets_and_class_references() {
        let (result, _, components, assets) = compile_text(
            r#"Panel { background-image: url("bg.png"); icon: Embed('icon.swf'); skin-class: ClassReference("skins.PanelSkin"); }"#,
        );
        result.unwrap();
        assert_eq!(assets.images, 1);
        assert_eq!(assets.swfs, 1);
        assert_eq!(components.count(&ClassName::new("skins.PanelSkin")), 1);
        assert_eq!(components.total(), 1);
    }

    #[test]
    fn reference_arguments_forms() {
        assert_eq!(
            references("url(plain.png) no-repeat"),
            vec![Reference::Asset("plain.png".to_owned())]
        );
        assert_eq!(
            references(r#"Embed(source="logo.swf", symbol="Logo")"#),
            vec![Reference::Asset("logo.swf".to_owned())]
        );
        assert_eq!(
            references("ClassReference(skins.ButtonSkin)"),
            vec![Reference::Component("skins.ButtonSkin".to_owned())]
        );
        assert!(references("ClassReference(null)").is_empty());
        assert!(references("red").is_empty());
    }

    #[test]
    fn quoted_url_with_semicolon_is_one_declaration() {
        let (result, strings, _, assets) = compile_text(r#"A { background: url("a;b.png"); color: red; }"#);
        let data = result.unwrap();
        assert_eq!(u16::from_le_bytes([data[10], data[11]]), 2);
        assert_eq!(assets.images, 1);
        assert_eq!(strings.get(2), Some(r#"url("a;b.png")"#));
    }

    #[test]
    fn closing_brace_inside_string_stays_in_value() {
        let rules = parse_rules(r#"A { content: "}"; color: red; } B { c: d; }"#).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].declarations[0], ("content".to_owned(), r#""}""#.to_owned()));
        assert_eq!(rules[0].declarations[1].0, "color");
        assert_eq!(rules[1].selector, "B");
    }

    #[test]
    fn media_rules_are_flattened_with_condition() {
        assert_eq!(
            selectors("@media print { A { b: c; } @supports (display: grid) { B { d: e; } } } C { f: g; }"),
            vec![
                (Some("@media print".to_owned()), "A".to_owned()),
                (
                    Some("@media print @supports (display: grid)".to_owned()),
                    "B".to_owned()
                ),
                (None, "C".to_owned()),
            ]
        );
    }

    #[test]
    fn font_face_keeps_descriptors_and_other_at_rules_are_skipped() {
        let text = r#"@namespace s "library://ns.adobe.com/flex/spark";
            @font-face { src: url("font.ttf"); fontFamily: Body; }
            @keyframes spin { from { a: b; } to { a: c; } }
            s|Button { color: red; }"#;
        let rules = parse_rules(text).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].selector, "@font-face");
        assert_eq!(rules[0].declarations.len(), 2);
        assert_eq!(rules[1].selector, "s|Button");
    }

    #[test]
    fn comments_are_ignored() {
        let (result, strings, _, _) = compile_text("/* header */ A { b: c; } /* trailer */");
        result.unwrap();
        assert_eq!(strings.get(0), Some("A"));
    }

    #[test]
    fn empty_stylesheet_compiles_to_zero_rules() {
        let (result, _, _, _) = compile_text("  \n");
        assert_eq!(result.unwrap(), vec![0, 0]);
    }

    #[test]
    fn block_closed_by_end_of_input_is_accepted() {
        let rules = parse_rules("A { color: red;").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].declarations.len(), 1);
    }

    #[test]
    fn invalid_declaration_is_dropped() {
        let rules = parse_rules("A { color red; fontSize: 12 }").unwrap();
        assert_eq!(rules[0].declarations, vec![("fontSize".to_owned(), "12".to_owned())]);
    }

    #[test]
    fn rule_without_block_is_compile_error() {
        let (result, _, _, _) = compile_text("Button color: red;");
        let err = result.unwrap_err();
        assert!(matches!(err, HostError::Compile { .. }));
        let msg = err.to_string();
        assert!(msg.contains("src/a.css"));
        assert!(msg.contains("no declaration block"));
    }

    #[test]
    fn too_many_declarations_is_compile_error() {
        let body: String = (0..=u32::from(u16::MAX)).map(|i| format!("p{i}: v;")).collect();
        let (result, strings, _, _) = compile_text(&format!("A {{ {body} }}"));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("declarations"));
        assert!(strings.is_empty());
    }
}
