//! End-to-end tests running the analyzer over the fixtures in `testdata/`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use cem_analyzer::analysis::ModuleFacts;
use cem_analyzer::manifest::{ClassDoc, ClassMember, ExportKind};
use cem_analyzer::plugins::{ClassContext, ModuleContext};
use cem_analyzer::{
    AnalysisContext, AnalysisOutput, AnalyzeError, DiagnosticKind, Manifest, Package, Plugin,
    PluginError, PluginPipeline, Reference, SourceInput, SourceSet,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

fn inputs(name: &str) -> Vec<SourceInput> {
    SourceSet::new(fixture(name), &["**/*.{js,ts,tsx}".to_string()], &[])
        .unwrap()
        .inputs()
        .unwrap()
}

fn pipeline(names: &[&str]) -> PluginPipeline {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let (pipeline, unavailable) = PluginPipeline::from_names(&names);
    assert!(unavailable.is_empty());
    pipeline
}

fn analyze(name: &str) -> AnalysisOutput {
    AnalysisContext::new(PluginPipeline::default())
        .run(inputs(name))
        .unwrap()
}

fn member_names(class: &ClassDoc) -> Vec<&str> {
    class.members.iter().map(|m| m.name.as_str()).collect()
}

fn declaration_names<'a>(manifest: &'a Manifest, module: &str) -> Vec<&'a str> {
    manifest
        .module(module)
        .unwrap()
        .declarations
        .iter()
        .map(|d| d.name())
        .collect()
}

#[test]
fn test_ignored_and_internal_declarations_are_not_emitted() {
    let output = analyze("visibility");
    let manifest = &output.manifest;

    assert_eq!(
        declaration_names(manifest, "src/elements.js"),
        vec!["variable", "IncludeMe"]
    );

    let definitions: Vec<_> = manifest
        .custom_element_definitions()
        .map(|(_, e)| (e.name.as_str(), e.declaration.name.as_str()))
        .collect();
    assert_eq!(definitions, vec![("include-me", "IncludeMe")]);

    let include_me = manifest.class("src/elements.js", "IncludeMe").unwrap();
    assert_eq!(member_names(include_me), vec!["included"]);
    assert_eq!(include_me.tag_name.as_deref(), Some("include-me"));
    assert!(include_me.custom_element);

    let json = cem_analyzer::report::to_json(manifest).unwrap();
    for hidden in ["dontIncludeMe", "meNeither", "IgnoreMe", "ignore-me", "sneaky"] {
        assert!(!json.contains(hidden), "{} leaked into the manifest", hidden);
    }
}

#[test]
fn test_reexport_chain_points_at_declaration() {
    let output = analyze("reexport");
    let manifest = &output.manifest;
    let button = Reference::local("Button", "src/button.js");

    let index = manifest.module("src/index.js").unwrap();
    let names: Vec<_> = index.exports.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["PrimaryButton", "Button"]);
    assert!(index.exports.iter().all(|e| e.declaration == button));

    let components = manifest.module("src/components.js").unwrap();
    assert_eq!(components.export("Button").unwrap().declaration, button);

    // The unknown star source is reported, not fatal.
    assert!(output.diagnostics.iter().any(|d| {
        d.module == "src/components.js"
            && d.kind == DiagnosticKind::UnresolvedReference
            && d.message.contains("missing.js")
    }));

    let class = manifest.class("src/button.js", "Button").unwrap();
    assert!(class.attribute("disabled").is_some());
    assert!(class.event("press").is_some());
    assert_eq!(class.tag_name.as_deref(), Some("x-button"));
}

#[test]
fn test_internal_base_still_contributes_members() {
    let output = analyze("inheritance");
    let manifest = &output.manifest;

    assert!(manifest.class("src/base.js", "InternalBase").is_none());

    let child = manifest.class("src/child.js", "Child").unwrap();
    assert_eq!(
        child.superclass,
        Some(Reference::local("InternalBase", "src/base.js"))
    );
    assert_eq!(child.mixins, vec![Reference::local("Focusable", "src/mixin.js")]);

    // Own members first, then the mixin, then the base. The override of
    // `size` stays in place and the internal `secret` is hidden.
    assert_eq!(member_names(child), vec!["label", "size", "focused", "render"]);
    assert!(child.member("size").unwrap().inherited_from.is_none());
    assert_eq!(
        child.member("render").unwrap().inherited_from,
        Some(Reference::local("Focusable", "src/mixin.js"))
    );
}

#[test]
fn test_inheritance_cycle_is_reported_and_broken() {
    let output = analyze("inheritance");
    let cycles: Vec<_> = output
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::CyclicInheritance)
        .collect();
    assert!(!cycles.is_empty());
    assert!(cycles.iter().all(|d| d.module == "src/cycle.js"));

    let manifest = &output.manifest;
    assert_eq!(member_names(manifest.class("src/cycle.js", "Ping").unwrap()), vec!["ping"]);
    assert_eq!(member_names(manifest.class("src/cycle.js", "Pong").unwrap()), vec!["pong"]);
}

#[test]
fn test_output_does_not_depend_on_input_order() {
    for name in ["inheritance", "reexport", "visibility"] {
        let forward = analyze(name);
        let mut reversed = inputs(name);
        reversed.reverse();
        let backward = AnalysisContext::new(PluginPipeline::default())
            .run(reversed)
            .unwrap();
        assert_eq!(forward.manifest, backward.manifest, "fixture {}", name);
        assert_eq!(forward.diagnostics, backward.diagnostics, "fixture {}", name);
    }
}

#[test]
fn test_framework_plugins() {
    let context = AnalysisContext::new(pipeline(&["lit", "fast", "stencil"]));
    let output = context.run(inputs("frameworks")).unwrap();
    let manifest = &output.manifest;

    let tags: BTreeSet<_> = manifest
        .custom_element_definitions()
        .map(|(_, e)| e.name.as_str())
        .collect();
    assert_eq!(
        tags,
        BTreeSet::from(["fast-badge", "lit-card", "stencil-toggle"])
    );

    let lit = manifest.class("src/lit-card.ts", "LitCard").unwrap();
    let attributes: BTreeSet<_> = lit.attributes.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(attributes, BTreeSet::from(["card-title", "open"]));
    assert_eq!(
        lit.attribute("card-title").unwrap().field_name.as_deref(),
        Some("heading")
    );
    assert!(lit.member("open").unwrap().reflects);
    assert!(lit.member("render").is_none());
    assert_eq!(lit.slots.len(), 1);
    assert_eq!(lit.superclass, Some(Reference::package("LitElement", "lit")));

    let fast = manifest.class("src/fast-badge.ts", "FastBadge").unwrap();
    let attributes: BTreeSet<_> = fast.attributes.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(attributes, BTreeSet::from(["circular", "color"]));
    assert_eq!(fast.member("circular").unwrap().type_text(), Some("boolean"));

    let stencil = manifest
        .class("src/stencil-toggle.tsx", "StencilToggle")
        .unwrap();
    assert!(stencil.attribute("checked-label").is_some());
    assert!(stencil.event("toggled").is_some());
    assert!(stencil.member("toggled").is_none());
    assert!(stencil.member("componentDidLoad").is_none());
    assert_eq!(stencil.tag_name.as_deref(), Some("stencil-toggle"));
}

#[test]
fn test_package_members_are_inherited() {
    let package = Package::load(
        "@acme/base",
        &fixture("packages").join("base-elements.json"),
    )
    .unwrap();
    let context = AnalysisContext::new(PluginPipeline::default()).with_packages(vec![package]);
    let output = context
        .run(vec![SourceInput::text(
            "src/fancy.js",
            "import { BaseElement } from '@acme/base';\nexport class Fancy extends BaseElement {\n  sparkle = true;\n}\n",
        )])
        .unwrap();

    let fancy = output.manifest.class("src/fancy.js", "Fancy").unwrap();
    assert_eq!(member_names(fancy), vec!["sparkle", "theme", "update"]);

    let from = fancy.member("theme").unwrap().inherited_from.clone().unwrap();
    assert_eq!(from.name, "BaseElement");
    assert_eq!(from.package.as_deref(), Some("@acme/base"));
    assert_eq!(from.module.as_deref(), Some("src/base-element.js"));
    assert!(fancy.attribute("theme").unwrap().inherited_from.is_some());

    // Package modules are linking context only.
    assert_eq!(output.manifest.modules.len(), 1);
}

#[test]
fn test_parse_failures_do_not_affect_siblings() {
    let mut sources = inputs("broken");
    sources.push(SourceInput::text("src/binary.js", vec![0xc3, 0x28, 0xff]));
    let output = AnalysisContext::new(PluginPipeline::default())
        .run(sources)
        .unwrap();

    assert!(output.manifest.class("src/ok.js", "Fine").is_some());
    assert!(output.manifest.module("src/binary.js").is_none());
    assert!(output.diagnostics.iter().any(|d| {
        d.module == "src/binary.js" && d.kind == DiagnosticKind::ParseFailure
    }));
    assert!(output.diagnostics.iter().any(|d| {
        d.module == "src/broken.js" && d.kind == DiagnosticKind::SyntaxError
    }));
}

#[test]
fn test_no_analyzable_modules() {
    let err = AnalysisContext::new(PluginPipeline::default())
        .run(vec![SourceInput::text("src/binary.js", vec![0xff, 0xfe])])
        .unwrap_err();
    assert!(matches!(err, AnalyzeError::NoModules { .. }));
    assert_eq!(err.diagnostics()[0].kind, DiagnosticKind::ParseFailure);
}

struct GhostPlugin;

impl Plugin for GhostPlugin {
    fn name(&self) -> &str {
        "ghost"
    }

    fn class_hook(
        &self,
        _ctx: &ClassContext<'_>,
        class: &ClassDoc,
    ) -> Result<Option<ClassDoc>, PluginError> {
        let mut next = class.clone();
        let mut member = ClassMember::field("haunted");
        member.inherited_from = Some(Reference::local("Ghost", "src/ghost.js"));
        next.members.push(member);
        Ok(Some(next))
    }
}

#[test]
fn test_dangling_reference_aborts_emission() {
    let context = AnalysisContext::new(PluginPipeline::new(vec![Box::new(GhostPlugin)]));
    let err = context
        .run(vec![SourceInput::text(
            "src/el.js",
            "export class El extends HTMLElement {}",
        )])
        .unwrap_err();

    let AnalyzeError::Validation {
        dangling,
        diagnostics,
    } = err
    else {
        panic!("expected a validation failure");
    };
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].module, "src/el.js");
    assert_eq!(dangling[0].location, "El.haunted.inheritedFrom");
    assert!(diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::MergeValidation));
}

struct FailingModulePlugin;

impl Plugin for FailingModulePlugin {
    fn name(&self) -> &str {
        "failing"
    }

    fn module_hook(
        &self,
        ctx: &ModuleContext<'_>,
        _facts: &ModuleFacts,
    ) -> Result<Option<ModuleFacts>, PluginError> {
        if ctx.path == "src/bad.js" {
            return Err(PluginError::new("failing", "cannot handle this module"));
        }
        Ok(None)
    }
}

#[test]
fn test_failed_module_hook_marks_module_partial() {
    let context = AnalysisContext::new(PluginPipeline::new(vec![Box::new(FailingModulePlugin)]));
    let output = context
        .run(vec![
            SourceInput::text("src/bad.js", "export class Bad extends HTMLElement {}"),
            SourceInput::text("src/good.js", "export class Good extends HTMLElement {}"),
        ])
        .unwrap();

    let bad = output.manifest.module("src/bad.js").unwrap();
    assert!(bad.partial);
    assert!(bad.class("Bad").is_some());
    assert!(!output.manifest.module("src/good.js").unwrap().partial);
    assert!(output.diagnostics.iter().any(|d| {
        d.module == "src/bad.js" && d.kind == DiagnosticKind::PluginFailure
    }));
}

#[test]
fn test_unavailable_plugin_is_reported_once() {
    let (pipeline, unavailable) =
        PluginPipeline::from_names(&["lit".to_string(), "vue".to_string(), "vue".to_string()]);
    assert_eq!(pipeline.names(), vec!["lit"]);

    let context = AnalysisContext::new(pipeline).with_diagnostics(unavailable);
    let output = context.run(inputs("visibility")).unwrap();
    let reported: Vec<_> = output
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::PluginUnavailable)
        .collect();
    assert_eq!(reported.len(), 1);
    assert!(reported[0].message.contains("vue"));
}

#[test]
fn test_definitions_are_deduplicated() {
    let output = AnalysisContext::new(PluginPipeline::default())
        .run(vec![
            SourceInput::text("src/el.js", "export class El extends HTMLElement {}"),
            SourceInput::text(
                "src/register.js",
                "import { El } from './el.js';\ncustomElements.define('x-el', El);\ncustomElements.define('x-el', El);\ncustomElements.define('x-alias', El);\n",
            ),
        ])
        .unwrap();

    let definitions: Vec<_> = output
        .manifest
        .modules
        .iter()
        .flat_map(|m| m.exports.iter())
        .filter(|e| e.kind == ExportKind::CustomElementDefinition)
        .map(|e| (e.name.as_str(), e.declaration.clone()))
        .collect();
    let el = Reference::local("El", "src/el.js");
    assert_eq!(definitions, vec![("x-el", el.clone()), ("x-alias", el)]);
}
