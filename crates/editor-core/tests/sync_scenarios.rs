//! Scenario tests for the plugin.
//!
//! Drives the plugin the way the host and the user do: note pushes from the
//! relay, typing in the widget, theme changes and a slow editor load.

use std::rc::Rc;

use editor_core::testing::{InMemoryMount, RecordingRelay};
use editor_core::{HostEvent, Note, NoteRef, Plugin, PluginConfig, ThemeMode};
use futures::executor::LocalPool;
use serde_json::json;

type TestPlugin = Plugin<RecordingRelay, InMemoryMount>;

fn build(pool: &LocalPool, relay: &RecordingRelay, mount: &InMemoryMount) -> TestPlugin {
    let plugin = Plugin::new(
        relay.clone(),
        mount.clone(),
        PluginConfig::default(),
        Rc::new(pool.spawner()),
    )
    .expect("default config is valid");
    plugin.connect().expect("stream registration");
    plugin
}

/// Plugin with a mounted editor.
fn mounted() -> (LocalPool, RecordingRelay, InMemoryMount, TestPlugin) {
    let mut pool = LocalPool::new();
    let relay = RecordingRelay::new();
    let mount = InMemoryMount::new();
    let plugin = build(&pool, &relay, &mount);
    plugin.handle(HostEvent::Ready).unwrap();
    pool.run_until_stalled();
    (pool, relay, mount, plugin)
}

#[test]
fn end_to_end_note_lifecycle() {
    let (_pool, relay, mount, plugin) = mounted();
    let widget = mount.widget().unwrap();

    // Host delivers note "a".
    relay.push(Note::new("a", "hello"));
    assert_eq!(widget.text(), "hello");

    // User appends text; the save carries the new text and cleared previews.
    widget.type_text(" world");
    let saves = relay.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].uuid, "a");
    assert_eq!(saves[0].content.text, "hello world");
    assert_eq!(saves[0].content.preview_plain, None);
    assert_eq!(saves[0].content.preview_html, None);

    // Host echoes the save back as a metadata update: nothing changes.
    let writes_before = widget.writes().len();
    relay.push(Note::new("a", "hello world").metadata_only());
    assert_eq!(widget.writes().len(), writes_before);
    assert_eq!(widget.text(), "hello world");

    // Host switches to note "b".
    relay.push(Note::new("b", "new note"));
    assert_eq!(widget.text(), "new note");
    assert_eq!(plugin.active_uuid().as_deref(), Some("b"));
    assert_eq!(plugin.last_text().as_deref(), Some("new note"));
    assert_eq!(relay.saves().len(), 1);
}

#[test]
fn metadata_updates_never_touch_the_editor() {
    let (_pool, relay, mount, _plugin) = mounted();
    let widget = mount.widget().unwrap();
    relay.push(Note::new("a", "original"));

    for text in ["one", "two", "three"] {
        relay.push(Note::new("a", text).metadata_only());
    }

    assert_eq!(widget.text(), "original");
    assert_eq!(widget.writes(), vec!["original".to_string()]);
}

#[test]
fn redundant_push_does_not_write() {
    let (_pool, relay, mount, _plugin) = mounted();
    let widget = mount.widget().unwrap();

    relay.push(Note::new("a", "same"));
    relay.push(Note::new("a", "same"));
    relay.push(Note::new("a", "same"));

    assert_eq!(widget.writes(), vec!["same".to_string()]);
}

#[test]
fn saved_text_is_not_written_back() {
    let (_pool, relay, mount, _plugin) = mounted();
    let widget = mount.widget().unwrap();
    relay.push(Note::new("a", "draft"));

    widget.type_text("!");
    relay.push(Note::new("a", "draft!"));

    assert_eq!(widget.writes(), vec!["draft".to_string()]);
}

#[test]
fn note_swap_with_identical_text_rechecks() {
    let (_pool, relay, mount, plugin) = mounted();
    let widget = mount.widget().unwrap();

    relay.push(Note::new("a", "template"));
    relay.push(Note::new("b", "template"));

    // The baseline was reset, so the new note's text was applied explicitly.
    assert_eq!(widget.writes(), vec!["template".to_string(), "template".to_string()]);
    assert_eq!(plugin.last_text().as_deref(), Some("template"));
    assert!(relay.saves().is_empty());
}

#[test]
fn client_data_comes_from_latest_push() {
    let (_pool, relay, mount, _plugin) = mounted();
    let widget = mount.widget().unwrap();

    relay.push(Note::new("a", "x").with_client_data(json!({"rev": 1})));
    relay.push(
        Note::new("a", "x")
            .with_client_data(json!({"rev": 2}))
            .metadata_only(),
    );
    widget.type_text("y");

    assert_eq!(relay.saves()[0].client_data, Some(json!({"rev": 2})));
}

#[test]
fn host_driven_apply_never_saves() {
    let (_pool, relay, mount, _plugin) = mounted();
    let widget = mount.widget().unwrap();

    for (uuid, text) in [("a", "1"), ("a", "2"), ("b", "3"), ("b", "4")] {
        relay.push(Note::new(uuid, text));
    }

    assert_eq!(widget.text(), "4");
    assert!(relay.saves().is_empty());
}

#[test]
fn presave_writes_to_captured_note() {
    let (_pool, relay, mount, _plugin) = mounted();
    let widget = mount.widget().unwrap();

    let note_a = relay.push(Note::new("a", "alpha"));
    relay.defer_presave(true);
    widget.type_text(" edited");

    // Host switches notes before it gets round to running the hook.
    let note_b = relay.push(Note::new("b", "beta"));
    relay.flush();

    let saved = relay.saved_refs();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].same_object(&note_a));
    assert_eq!(note_a.text(), "alpha edited");
    assert_eq!(note_b.text(), "beta");
}

#[test]
fn deferred_save_keeps_its_own_client_data_across_a_swap() {
    let (_pool, relay, mount, plugin) = mounted();
    let widget = mount.widget().unwrap();

    let note_a = relay.push(
        Note::new("a", "alpha").with_client_data(json!({"owner": "a"})),
    );
    relay.defer_presave(true);
    widget.type_text("!");

    relay.push(Note::new("b", "beta").with_client_data(json!({"owner": "b"})));
    relay.flush();

    assert_eq!(note_a.client_data(), Some(json!({"owner": "a"})));
    // The late hook belongs to "a" and must not become "b"'s baseline.
    assert_eq!(plugin.active_uuid().as_deref(), Some("b"));
    assert_eq!(plugin.last_text().as_deref(), Some("beta"));
    assert_eq!(note_a.text(), "alpha!");
}

#[test]
fn notes_pushed_while_loading_become_initial_value() {
    let mut pool = LocalPool::new();
    let relay = RecordingRelay::new();
    let (mount, gate) = InMemoryMount::gated();
    let plugin = build(&pool, &relay, &mount);

    plugin.handle(HostEvent::Ready).unwrap();
    pool.run_until_stalled();
    assert_eq!(plugin.editor_state(), "loading");

    relay.push(Note::new("a", "first"));
    relay.push(Note::new("a", "second"));

    gate.open();
    pool.run_until_stalled();

    let widget = mount.widget().unwrap();
    assert_eq!(widget.text(), "second");
    assert_eq!(plugin.last_text().as_deref(), Some("second"));
    assert!(relay.saves().is_empty());
}

#[test]
fn note_pushed_before_ready_is_used_at_construction() {
    let mut pool = LocalPool::new();
    let relay = RecordingRelay::new();
    let mount = InMemoryMount::new();
    let plugin = build(&pool, &relay, &mount);

    relay.push(Note::new("a", "early"));
    plugin.handle(HostEvent::Ready).unwrap();
    pool.run_until_stalled();

    assert_eq!(mount.inits()[0].value, "early");
    let widget = mount.widget().unwrap();
    assert!(widget.writes().is_empty());

    relay.push(Note::new("a", "early"));
    assert!(widget.writes().is_empty());
}

#[test]
fn theme_switch_updates_live_editor() {
    let (_pool, _relay, mount, plugin) = mounted();
    let widget = mount.widget().unwrap();
    assert_eq!(widget.theme(), Some(ThemeMode::Light));

    plugin
        .handle(HostEvent::ThemesChanged {
            active_themes: vec!["org.standardnotes.theme-focus".into()],
        })
        .unwrap();
    assert_eq!(plugin.theme(), ThemeMode::Dark);
    assert_eq!(widget.theme(), Some(ThemeMode::Dark));

    plugin
        .handle(HostEvent::ThemesChanged { active_themes: vec![] })
        .unwrap();
    assert_eq!(widget.theme(), Some(ThemeMode::Light));
    assert_eq!(mount.widget_count(), 1);
}

#[test]
fn theme_chosen_before_ready_is_used_at_construction() {
    let mut pool = LocalPool::new();
    let relay = RecordingRelay::new();
    let mount = InMemoryMount::new();
    let plugin = build(&pool, &relay, &mount);

    plugin
        .on_themes_change(&["com.standardnotes.theme-proton"])
        .unwrap();
    plugin.handle(HostEvent::Ready).unwrap();
    pool.run_until_stalled();

    assert_eq!(mount.inits()[0].theme, "vs-dark");
    assert_eq!(mount.widget().unwrap().theme(), Some(ThemeMode::Dark));
}

#[test]
fn theme_change_during_load_is_applied_after_mount() {
    let mut pool = LocalPool::new();
    let relay = RecordingRelay::new();
    let (mount, gate) = InMemoryMount::gated();
    let plugin = build(&pool, &relay, &mount);

    plugin.handle(HostEvent::Ready).unwrap();
    pool.run_until_stalled();
    plugin
        .on_themes_change(&["org.standardnotes.theme-futura"])
        .unwrap();
    gate.open();
    pool.run_until_stalled();

    assert_eq!(mount.inits()[0].theme, "vs");
    assert_eq!(mount.widget().unwrap().theme(), Some(ThemeMode::Dark));
}

#[tokio::test]
async fn mount_editor_can_be_awaited_directly() {
    let pool = LocalPool::new();
    let relay = RecordingRelay::with_platform("web");
    let mount = InMemoryMount::new();
    let plugin = build(&pool, &relay, &mount);

    relay.push(Note::new("a", "direct"));
    plugin.mount_editor().await.unwrap();

    assert!(plugin.is_editor_ready());
    assert_eq!(plugin.editor_value().unwrap(), "direct");
}

#[tokio::test]
async fn failed_widget_write_releases_suppression() {
    let pool = LocalPool::new();
    let relay = RecordingRelay::new();
    let mount = InMemoryMount::new();
    let plugin = build(&pool, &relay, &mount);
    plugin.mount_editor().await.unwrap();
    let widget = mount.widget().unwrap();

    widget.fail_next_write();
    relay.push(Note::new("a", "rejected"));
    assert_eq!(widget.text(), "");

    // Suppression was released, so the next user edit saves.
    widget.type_text("typed");
    assert_eq!(relay.saves().len(), 1);
    assert_eq!(relay.saves()[0].content.text, "typed");
}
