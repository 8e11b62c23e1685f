use localstyle_core::{
    CoreError, LocalStyleHolder, LocalStyleKind, ModuleStyleCollector, ProblemsHolder,
};
use localstyle_host::{
    AssetCounter, ComponentReferenceCounter, Element, Fixture, InMemoryHost, ModuleNature,
    StringRegistry, TextCssCompiler, WriterSinks,
};
use localstyle_schema::{
    parse_config_str, CollectorConfig, FileId, ModuleName, MX_APPLICATION, SPARK_APPLICATION,
};
use std::path::Path;
use std::thread;
use std::time::Duration;

const NS: &str = "http://ns.adobe.com/mxml/2009";

#[derive(Debug)]
struct Run {
    holders: Option<Vec<LocalStyleHolder>>,
    problems: ProblemsHolder,
    strings: usize,
}

fn collect_with(
    host: &InMemoryHost,
    config: CollectorConfig,
    module: &str,
    sdk: &str,
) -> Result<Run, CoreError> {
    let mut strings = StringRegistry::new();
    let mut components = ComponentReferenceCounter::new();
    let mut assets = AssetCounter::new();
    let mut problems = ProblemsHolder::new();
    let holders = {
        let mut compiler = TextCssCompiler::new(WriterSinks {
            strings: &mut strings,
            components: &mut components,
            assets: &mut assets,
        });
        ModuleStyleCollector::new(host, config).collect(
            &ModuleName::new(module),
            sdk,
            &mut compiler,
            &mut problems,
        )?
    };
    Ok(Run {
        holders,
        problems,
        strings: strings.len(),
    })
}

fn collect(host: &InMemoryHost, module: &str, sdk: &str) -> Run {
    collect_with(host, CollectorConfig::default(), module, sdk).unwrap()
}

fn style_ref(source: &str) -> Element {
    Element::new(NS, "Style").with_attribute("source", Some(source))
}

fn style_inline(text: &str) -> Element {
    Element::new(NS, "Style").with_text(text)
}

fn component(children: Vec<Element>) -> Element {
    children
        .into_iter()
        .fold(Element::new(NS, "Application"), Element::with_child)
}

fn app_host() -> InMemoryHost {
    let host = InMemoryHost::new();
    host.add_module("sdk", ModuleNature::Library, &[], &[]);
    host.add_module("app", ModuleNature::Application, &["app/src"], &["sdk"]);
    host.declare_class(MX_APPLICATION, "sdk", None, None);
    host.declare_class(SPARK_APPLICATION, "sdk", Some(MX_APPLICATION), None);
    host
}

fn fixture_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn users(holder: &LocalStyleHolder) -> Vec<&str> {
    let mut users: Vec<&str> = holder.users().iter().map(FileId::as_str).collect();
    users.sort_unstable();
    users
}

#[test]
fn shared_stylesheet_is_compiled_once_for_all_users() {
    let host = app_host();
    host.add_stylesheet("app/src/shared.css", "Button { color: red; }");
    for name in ["A", "B", "C"] {
        let path = format!("app/src/{name}.mxml");
        host.declare_class(name, "app", Some(MX_APPLICATION), Some(path.as_str()));
        host.add_markup(&path, component(vec![style_ref("shared.css")]));
    }

    let run = collect(&host, "app", "4.6");
    let holders = run.holders.unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].kind(), LocalStyleKind::External);
    assert_eq!(holders[0].file.id, "app/src/shared.css");
    assert_eq!(
        users(&holders[0]),
        vec!["app/src/A.mxml", "app/src/B.mxml", "app/src/C.mxml"]
    );
    assert!(run.problems.is_empty());
}

#[test]
fn inline_holder_identity_is_hosting_file() {
    let host = app_host();
    host.declare_class("Main", "app", Some(MX_APPLICATION), Some("app/src/Main.mxml"));
    host.add_markup("app/src/Main.mxml", component(vec![style_inline("A { b: c; }")]));

    let holders = collect(&host, "app", "4.6").holders.unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].kind(), LocalStyleKind::Inline);
    assert_eq!(holders[0].file.id, "app/src/Main.mxml");
    assert!(holders[0].users().is_empty());
}

#[test]
fn identical_inline_blocks_are_not_deduplicated() {
    let host = app_host();
    for name in ["A", "B"] {
        let path = format!("app/src/{name}.mxml");
        host.declare_class(name, "app", Some(MX_APPLICATION), Some(path.as_str()));
        host.add_markup(&path, component(vec![style_inline("A { b: c; }")]));
    }

    let holders = collect(&host, "app", "4.6").holders.unwrap();
    assert_eq!(holders.len(), 2);
    assert_eq!(holders[0].digest(), holders[1].digest());
    assert_ne!(holders[0].file.id, holders[1].file.id);
}

#[test]
fn non_css_reference_is_reported_and_siblings_continue() {
    let host = app_host();
    host.add_file("app/src/notacss.txt", "hello");
    host.declare_class("Main", "app", Some(MX_APPLICATION), Some("app/src/Main.mxml"));
    host.add_markup(
        "app/src/Main.mxml",
        component(vec![
            style_ref("notacss.txt").with_line(4),
            style_inline("A { b: c; }"),
        ]),
    );

    let run = collect(&host, "app", "4.6");
    let holders = run.holders.unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].kind(), LocalStyleKind::Inline);

    let problems = run.problems.problems();
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].file, "app/src/Main.mxml");
    assert_eq!(problems[0].line, Some(4));
    assert!(problems[0].message.contains("notacss.txt"));
}

#[test]
fn unresolvable_reference_is_reported() {
    let host = app_host();
    host.declare_class("Main", "app", Some(MX_APPLICATION), Some("app/src/Main.mxml"));
    host.add_markup("app/src/Main.mxml", component(vec![style_ref("missing.css")]));

    let run = collect(&host, "app", "4.6");
    assert_eq!(run.holders.unwrap().len(), 0);
    assert_eq!(run.problems.len(), 1);
    assert!(run.problems.problems()[0].message.contains("missing.css"));
}

#[test]
fn source_attribute_without_value_is_ignored() {
    let host = app_host();
    host.declare_class("Main", "app", Some(MX_APPLICATION), Some("app/src/Main.mxml"));
    host.add_markup(
        "app/src/Main.mxml",
        component(vec![Element::new(NS, "Style")
            .with_attribute("source", None)
            .with_text("A { b: c; }")]),
    );

    let run = collect(&host, "app", "4.6");
    assert_eq!(run.holders.unwrap().len(), 0);
    assert!(run.problems.is_empty());
}

#[test]
fn style_tags_outside_the_namespace_or_nested_are_ignored() {
    let host = app_host();
    host.declare_class("Main", "app", Some(MX_APPLICATION), Some("app/src/Main.mxml"));
    host.add_markup(
        "app/src/Main.mxml",
        component(vec![
            Element::new("library://other", "Style").with_text("A { b: c; }"),
            Element::new(NS, "Group").with_child(style_inline("A { b: c; }")),
        ]),
    );

    let holders = collect(&host, "app", "4.6").holders.unwrap();
    assert!(holders.is_empty());
}

#[test]
fn library_with_defaults_stylesheet_yields_single_holder() {
    let host = InMemoryHost::new();
    host.add_module("lib", ModuleNature::Library, &["lib/src"], &[]);
    host.add_stylesheet("lib/src/defaults.css", "Button { color: red; }");
    host.declare_class("lib.Widget", "lib", None, Some("lib/src/Widget.mxml"));
    host.add_markup("lib/src/Widget.mxml", component(vec![style_inline("A { b: c; }")]));

    let run = collect(&host, "lib", "4.6");
    let holders = run.holders.unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].file.id, "lib/src/defaults.css");
    assert_eq!(holders[0].kind(), LocalStyleKind::Defaults);
}

#[test]
fn stylesheet_that_fails_to_compile_does_not_lose_sibling_holders() {
    let host = app_host();
    host.add_stylesheet("app/src/print.css", "Button color: red;");
    host.declare_class("Good", "app", Some(SPARK_APPLICATION), Some("app/src/Good.mxml"));
    host.declare_class("Print", "app", Some(SPARK_APPLICATION), Some("app/src/Print.mxml"));
    host.add_markup("app/src/Good.mxml", component(vec![style_inline("A { b: c; }")]));
    host.add_markup(
        "app/src/Print.mxml",
        component(vec![
            style_ref("print.css").with_line(2),
            style_inline("B { d: e; }"),
        ]),
    );

    let run = collect(&host, "app", "4.6");
    let holders = run.holders.unwrap();
    let mut files: Vec<&str> = holders.iter().map(|h| h.file.id.as_str()).collect();
    files.sort_unstable();
    assert_eq!(files, vec!["app/src/Good.mxml", "app/src/Print.mxml"]);

    assert_eq!(run.problems.len(), 1);
    let problem = &run.problems.problems()[0];
    assert_eq!(problem.file, "app/src/Print.mxml");
    assert_eq!(problem.line, Some(2));
    assert!(problem.message.contains("app/src/print.css"));
}

#[test]
fn conditional_and_quoted_css_compiles() {
    let host = app_host();
    host.add_stylesheet(
        "app/src/print.css",
        r#"@media print { A { b: c; } }
        @font-face { src: url("fonts/a;b.ttf"); fontFamily: Body; }
        Label { content: "}"; }"#,
    );
    host.declare_class("Print", "app", Some(SPARK_APPLICATION), Some("app/src/Print.mxml"));
    host.add_markup("app/src/Print.mxml", component(vec![style_ref("print.css")]));

    let run = collect(&host, "app", "4.6");
    let holders = run.holders.unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].kind(), LocalStyleKind::External);
    assert!(run.problems.is_empty());
}

#[test]
fn library_defaults_that_fail_to_compile_are_a_problem() {
    let host = InMemoryHost::new();
    host.add_module("lib", ModuleNature::Library, &["lib/src"], &[]);
    host.add_stylesheet("lib/src/defaults.css", "Button color: red;");

    let run = collect(&host, "lib", "4.6");
    assert!(run.holders.is_none());
    assert_eq!(run.problems.len(), 1);
    assert_eq!(run.problems.problems()[0].file, "lib/src/defaults.css");
}

#[test]
fn library_without_defaults_stylesheet_is_absent() {
    let host = InMemoryHost::new();
    host.add_module("lib", ModuleNature::Library, &["lib/src"], &[]);
    assert!(collect(&host, "lib", "4.6").holders.is_none());
}

#[test]
fn application_without_base_types_is_absent() {
    let host = InMemoryHost::new();
    host.add_module("app", ModuleNature::Application, &["app/src"], &[]);
    host.declare_class("Main", "app", None, Some("app/src/Main.mxml"));
    host.add_markup("app/src/Main.mxml", component(vec![style_inline("A { b: c; }")]));

    let run = collect(&host, "app", "4.6");
    assert!(run.holders.is_none());
    assert!(run.problems.is_empty());
}

#[test]
fn legacy_sdk_scenario_from_fixture() {
    let host = Fixture::load(fixture_path("shared_styles.json"))
        .unwrap()
        .into_host();

    let run = collect(&host, "app", "3.5");
    let holders = run.holders.unwrap();
    assert_eq!(holders.len(), 2);

    assert_eq!(holders[0].file.id, "app/src/shared.css");
    assert_eq!(
        users(&holders[0]),
        vec!["app/src/C1.mxml", "app/src/C2.mxml"]
    );
    assert_eq!(holders[1].kind(), LocalStyleKind::Inline);
    assert_eq!(holders[1].file.id, "app/src/C2.mxml");

    let problems = run.problems.problems();
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].file, "app/src/C2.mxml");
    assert_eq!(problems[0].line, Some(4));
}

#[test]
fn compiler_sinks_see_every_compiled_stylesheet() {
    let host = Fixture::load(fixture_path("shared_styles.json"))
        .unwrap()
        .into_host();
    let run = collect(&host, "app", "4.6");
    // Button, color, red, .title, fontSize, 12
    assert_eq!(run.strings, 6);
}

#[test]
fn custom_config_changes_tag_and_attribute() {
    let host = app_host();
    host.add_stylesheet("app/src/shared.css", "A { b: c; }");
    host.declare_class("Main", "app", Some(MX_APPLICATION), Some("app/src/Main.mxml"));
    host.add_markup(
        "app/src/Main.mxml",
        component(vec![
            Element::new(NS, "Skin").with_attribute("href", Some("shared.css")),
            style_ref("shared.css"),
        ]),
    );
    let config = parse_config_str(
        r#"
[style]
tag = "Skin"
source_attribute = "href"
"#,
    )
    .unwrap();

    let run = collect_with(&host, config, "app", "4.6").unwrap();
    let holders = run.holders.unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].file.id, "app/src/shared.css");
}

#[test]
fn stale_index_is_awaited() {
    let host = app_host();
    host.declare_class("Main", "app", Some(MX_APPLICATION), Some("app/src/Main.mxml"));
    host.add_markup("app/src/Main.mxml", component(vec![style_inline("A { b: c; }")]));
    host.start_indexing();

    let background = host.clone();
    let indexer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        background.finish_indexing();
    });

    let run = collect(&host, "app", "4.6");
    indexer.join().unwrap();
    assert_eq!(run.holders.unwrap().len(), 1);
}

#[test]
fn uncommitted_edits_are_flushed_before_collection() {
    let host = app_host();
    host.declare_class("Main", "app", Some(MX_APPLICATION), Some("app/src/Main.mxml"));
    host.add_markup("app/src/Main.mxml", component(vec![style_inline("A { b: c; }")]));
    host.mark_uncommitted();

    let background = host.clone();
    let committer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        background.commit_all();
    });

    let run = collect(&host, "app", "4.6");
    committer.join().unwrap();
    assert_eq!(run.holders.unwrap().len(), 1);
    assert!(!localstyle_host::SourceModel::has_uncommitted_edits(&host));
}

#[test]
fn read_access_is_released_after_success_and_failure() {
    let host = app_host();
    host.declare_class("Main", "app", Some(MX_APPLICATION), Some("app/src/Main.mxml"));
    host.add_markup("app/src/Main.mxml", component(vec![style_inline("A { b: c; }")]));

    collect(&host, "app", "4.6");
    assert_eq!(host.active_readers(), 0);
    assert_eq!(host.read_acquisitions(), 1);

    let err = collect_with(&host, CollectorConfig::default(), "app", "not-a-version");
    assert!(err.is_err());
    assert_eq!(host.active_readers(), 0);
}

#[test]
fn collecting_under_read_access_with_pending_edits_is_refused() {
    use localstyle_host::SourceModel;

    let host = app_host();
    host.mark_uncommitted();
    host.acquire_read();
    let err = collect_with(&host, CollectorConfig::default(), "app", "4.6").unwrap_err();
    host.release_read();
    assert!(matches!(err, CoreError::CommitWaitUnderReadAccess));
}

#[test]
fn independent_passes_do_not_share_caches() {
    let host = app_host();
    host.add_stylesheet("app/src/shared.css", "A { b: c; }");
    host.declare_class("Main", "app", Some(MX_APPLICATION), Some("app/src/Main.mxml"));
    host.add_markup("app/src/Main.mxml", component(vec![style_ref("shared.css")]));

    let first = collect(&host, "app", "4.6").holders.unwrap();
    let second = collect(&host, "app", "4.6").holders.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].digest(), second[0].digest());
}
