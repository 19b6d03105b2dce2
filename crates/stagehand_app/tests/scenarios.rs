// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end editing scenarios across the core, the sequencer and the studio.

use stagehand_app::{ProjectFile, Studio};
use stagehand_core::math::{quat_dot, quat_from_axis_angle};
use stagehand_core::{
    BonePose, BoneSpec, CharacterSpec, CreateEntityCommand, DeleteEntityCommand, Editor, EntityBlueprint, EntityId,
    EntityProperties, EntityRecord, ParentRef, RenameEntityCommand, ReparentEntityCommand, Scene, SelectableRef,
    SelectionEvent, SetVisibilityCommand, ShapeKind, Transform,
};
use stagehand_sequencer::{
    CameraTrack, CharacterPoseTrack, EntityTransformTrack, Keyframe, KeyframeList, PoseKeyframe, TimelineManager,
};
use std::cell::RefCell;
use std::rc::Rc;

fn character_blueprint(name: &str) -> EntityBlueprint {
    EntityBlueprint::new(
        name,
        EntityProperties::Character(CharacterSpec {
            source: format!("{name}.glb"),
            bones: vec![
                BoneSpec::new("hips", None, [0.0, 1.0, 0.0]),
                BoneSpec::new("spine", Some("hips"), [0.0, 0.3, 0.0]),
                BoneSpec::new("hand", Some("spine"), [0.4, 0.2, 0.0]),
            ],
            pose: Default::default(),
        }),
    )
}

fn snapshot(scene: &Scene) -> Vec<EntityRecord> {
    scene.serialize_entities()
}

#[test]
fn test_undo_redo_lifo_law() {
    let mut editor = Editor::new();
    let base = editor
        .scene
        .spawn(EntityBlueprint::shape("base", ShapeKind::Sphere).at([0.0, 1.0, 0.0]))
        .unwrap();
    let before = snapshot(&editor.scene);

    let cube = EntityId::new();
    editor
        .execute(CreateEntityCommand::new(
            EntityBlueprint::shape("cube", ShapeKind::Cube).with_id(cube),
        ))
        .unwrap();
    editor.execute(RenameEntityCommand::new(base, "pedestal")).unwrap();
    editor.execute(SetVisibilityCommand::new(base, false)).unwrap();
    editor
        .execute(ReparentEntityCommand::new(cube, ParentRef::Entity(base)))
        .unwrap();
    editor.execute(DeleteEntityCommand::new(cube)).unwrap();
    let after = snapshot(&editor.scene);
    assert_ne!(before, after);
    assert_eq!(editor.history.undo_depth(), 5);

    for _ in 0..5 {
        assert!(editor.undo().unwrap());
    }
    assert!(!editor.undo().unwrap());
    assert_eq!(snapshot(&editor.scene), before);

    for _ in 0..5 {
        assert!(editor.redo().unwrap());
    }
    assert!(!editor.redo().unwrap());
    assert_eq!(snapshot(&editor.scene), after);
}

#[test]
fn test_new_command_invalidates_redo() {
    let mut editor = Editor::new();
    editor
        .execute(CreateEntityCommand::new(EntityBlueprint::shape("a", ShapeKind::Cube)))
        .unwrap();
    editor.undo().unwrap();
    assert!(editor.history.can_redo());

    editor
        .execute(CreateEntityCommand::new(EntityBlueprint::shape("b", ShapeKind::Cone)))
        .unwrap();
    assert!(!editor.history.can_redo());
    assert!(!editor.redo().unwrap());
    assert_eq!(editor.history.undo_depth(), 1);
}

#[test]
fn test_selection_precedence_between_characters() {
    let mut editor = Editor::new();
    let first = editor.scene.spawn(character_blueprint("first")).unwrap();
    let second = editor.scene.spawn(character_blueprint("second")).unwrap();

    assert!(editor.select(SelectableRef::Entity(first)));

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    editor.selection.events.subscribe(move |e: &SelectionEvent| sink.borrow_mut().push(e.clone()));

    assert!(editor.select(SelectableRef::bone(first, "hand")));
    assert_eq!(editor.selection.current_entity(), Some(first));
    assert!(!events.borrow().contains(&SelectionEvent::EntitySelected(None)));

    events.borrow_mut().clear();
    assert!(editor.select(SelectableRef::bone(second, "hand")));
    assert_eq!(events.borrow().first(), Some(&SelectionEvent::EntitySelected(None)));
    assert_ne!(editor.selection.current_entity(), Some(first));
    assert_eq!(editor.selection.current(), Some(&SelectableRef::bone(second, "hand")));
}

#[test]
fn test_soft_delete_restores_mesh_visibility() {
    let mut scene = Scene::new();
    let id = scene
        .spawn(EntityBlueprint::shape("lamp", ShapeKind::Cylinder).with_meshes(["lamp_mesh", "shade"]))
        .unwrap();

    let Scene { graph, objects, .. } = &mut scene;
    let meshes = objects.get(id).unwrap().mesh_children(graph);
    assert_eq!(meshes.len(), 2);
    graph.set_visible(meshes[1], false).unwrap();

    assert!(objects.delete_entity(id, graph));
    assert!(objects.is_deleted(id));
    assert!(!graph.is_visible(objects.get(id).unwrap().node()));
    assert!(meshes.iter().all(|m| !graph.is_visible(*m)));

    assert!(objects.undo_delete_entity(id, graph));
    assert!(!objects.is_deleted(id));
    assert!(graph.is_visible(objects.get(id).unwrap().node()));
    assert!(graph.is_visible(meshes[0]));
    assert!(!graph.is_visible(meshes[1]));
}

#[test]
fn test_keyframe_replace_not_duplicate() {
    let mut scene = Scene::new();
    let mut track = CameraTrack::new("Camera");
    let first = track.add_keyframe(2.0, &scene);
    scene.camera.fov = 70.0;
    let replaced = track.add_keyframe(2.005, &scene);
    assert_eq!(first, replaced);
    assert_eq!(track.keyframes.len(), 1);
    assert_eq!(track.keyframes.iter().next().unwrap().data.fov, 70.0);

    let later = track.add_keyframe(3.0, &scene);
    assert_ne!(later, first);
    track.add_keyframe(0.5, &scene);
    let times: Vec<f32> = track.keyframes.iter().map(|k| k.time).collect();
    assert_eq!(times, vec![0.5, 2.005, 3.0]);
}

#[test]
fn test_interpolation_boundaries() {
    let mut scene = Scene::new();
    let id = scene.spawn(EntityBlueprint::shape("cube", ShapeKind::Cube)).unwrap();
    let mut track = EntityTransformTrack::new("cube", id);

    let start = Transform::from_position([1.0, 0.0, 0.0]).with_scale([1.0, 1.0, 1.0]);
    let end = Transform::from_position([3.0, 2.0, 0.0])
        .with_rotation(quat_from_axis_angle([0.0, 1.0, 0.0], 2.0))
        .with_scale([2.0, 4.0, 2.0]);
    scene.set_entity_transform(id, start).unwrap();
    track.add_keyframe(1.0, &scene).unwrap();
    scene.set_entity_transform(id, end).unwrap();
    track.add_keyframe(3.0, &scene).unwrap();

    track.update_target_at_time(0.0, &mut scene).unwrap();
    assert_eq!(scene.entity_transform(id).unwrap(), start);
    track.update_target_at_time(4.0, &mut scene).unwrap();
    assert_eq!(scene.entity_transform(id).unwrap(), end);

    track.update_target_at_time(2.0, &mut scene).unwrap();
    let mid = scene.entity_transform(id).unwrap();
    assert_eq!(mid.position, [2.0, 1.0, 0.0]);
    assert_eq!(mid.scale, [1.5, 2.5, 1.5]);
    let expected = quat_from_axis_angle([0.0, 1.0, 0.0], 1.0);
    assert!(quat_dot(mid.rotation, expected).abs() > 0.99999);
}

#[test]
fn test_sparse_pose_round_trip() {
    let mut scene = Scene::new();
    let hero = scene.spawn(character_blueprint("hero")).unwrap();
    {
        let Scene { graph, objects, .. } = &mut scene;
        let data = objects.get_mut(hero).unwrap().character_mut().unwrap();
        data.apply_bone_pose(graph, "spine", &BonePose::rotation(quat_from_axis_angle([1.0, 0.0, 0.0], 0.3)));
        data.apply_bone_pose(
            graph,
            "hand",
            &BonePose {
                rotation: quat_from_axis_angle([0.0, 0.0, 1.0], -0.7),
                position: Some([0.5, 0.25, 0.1]),
            },
        );
        data.update_skeleton(graph);
    }

    let mut track = CharacterPoseTrack::new("pose", hero);
    track.add_keyframe(0.5, &scene).unwrap();
    let original = track.keyframes.to_vec();
    assert_eq!(original[0].data.bones.len(), 2);
    assert!(!original[0].data.bones.contains_key("hips"));

    let json = serde_json::to_string(&original).unwrap();
    let restored: KeyframeList<PoseKeyframe> = serde_json::from_str::<Vec<Keyframe<PoseKeyframe>>>(&json).unwrap().into();
    let restored = restored.to_vec();
    assert_eq!(restored.len(), 1);
    let (a, b) = (&original[0].data.bones, &restored[0].data.bones);
    assert_eq!(a.keys().collect::<Vec<_>>(), b.keys().collect::<Vec<_>>());
    for (name, pose) in a {
        let other = &b[name];
        assert!(quat_dot(pose.rotation, other.rotation).abs() > 0.999_999);
        assert_eq!(pose.position.is_some(), other.position.is_some());
        if let (Some(p), Some(q)) = (pose.position, other.position) {
            assert!(p.iter().zip(q).all(|(x, y)| (x - y).abs() < 1e-6));
        }
    }
    assert!(b["spine"].position.is_none());
}

#[test]
fn test_entity_lifecycle_scenario() {
    let mut editor = Editor::new();
    let id = EntityId::new();
    editor
        .execute(CreateEntityCommand::new(
            EntityBlueprint::shape("cube-1", ShapeKind::Cube)
                .with_id(id)
                .at([0.0, 0.0, 0.0]),
        ))
        .unwrap();
    assert_eq!(editor.history.undo_depth(), 1);

    editor.undo().unwrap();
    let entity = editor.scene.objects.get(id).unwrap();
    assert!(!entity.is_visible(&editor.scene.graph));

    editor.redo().unwrap();
    let entity = editor.scene.objects.get(id).unwrap();
    assert!(entity.is_visible(&editor.scene.graph));
    assert_eq!(editor.scene.entity_transform(id).unwrap().position, [0.0, 0.0, 0.0]);
}

#[test]
fn test_transform_drag_scenario() {
    let mut editor = Editor::new();
    let id = editor
        .scene
        .spawn(EntityBlueprint::shape("crate", ShapeKind::Cube).at([1.0, 2.0, 3.0]))
        .unwrap();
    assert!(editor.select(SelectableRef::Entity(id)));

    assert!(editor.begin_drag());
    assert!(editor.update_drag(Transform::from_position([2.5, 3.5, 4.5])));
    assert!(editor.update_drag(Transform::from_position([4.0, 5.0, 6.0])));
    assert!(editor.end_drag());
    assert_eq!(editor.history.undo_depth(), 1);
    assert_eq!(editor.scene.entity_transform(id).unwrap().position, [4.0, 5.0, 6.0]);

    editor.undo().unwrap();
    assert_eq!(editor.scene.entity_transform(id).unwrap().position, [1.0, 2.0, 3.0]);
    editor.redo().unwrap();
    assert_eq!(editor.scene.entity_transform(id).unwrap().position, [4.0, 5.0, 6.0]);
}

#[test]
fn test_bone_control_drag_records_pose_and_undoes() {
    let mut editor = Editor::new();
    let hero = editor.scene.spawn(character_blueprint("hero")).unwrap();
    let pose = |editor: &Editor| {
        editor
            .scene
            .objects
            .get(hero)
            .unwrap()
            .character()
            .unwrap()
            .sparse_pose(&editor.scene.graph)
    };

    assert!(editor.select(SelectableRef::Entity(hero)));
    assert!(editor.select(SelectableRef::bone(hero, "hand")));
    assert!(pose(&editor).is_empty());

    let rotation = quat_from_axis_angle([0.0, 0.0, 1.0], 0.8);
    assert!(editor.begin_drag());
    assert!(editor.update_drag(Transform::default().with_rotation(rotation)));
    assert!(editor.end_drag());
    assert_eq!(editor.history.undo_depth(), 1);

    let dragged = pose(&editor);
    assert_eq!(dragged.len(), 1);
    assert!(quat_dot(dragged["hand"].rotation, rotation).abs() > 0.999_99);
    assert!(dragged["hand"].position.is_none());

    editor.undo().unwrap();
    assert!(pose(&editor).is_empty());

    editor.redo().unwrap();
    assert!(quat_dot(pose(&editor)["hand"].rotation, rotation).abs() > 0.999_99);
}

#[test]
fn test_drag_cancelled_by_deselect_is_not_recorded() {
    let mut editor = Editor::new();
    let id = editor.scene.spawn(EntityBlueprint::shape("crate", ShapeKind::Cube)).unwrap();
    editor.select(SelectableRef::Entity(id));
    editor.begin_drag();
    editor.update_drag(Transform::from_position([9.0, 0.0, 0.0]));
    editor.deselect_all();

    assert!(!editor.end_drag());
    assert!(!editor.history.can_undo());
}

#[test]
fn test_timeline_camera_scenario() {
    let mut scene = Scene::new();
    let mut timeline = TimelineManager::new();
    timeline.create_camera_track("Camera");

    scene.camera.fov = 45.0;
    timeline.add_keyframe(&scene).unwrap();
    timeline.set_current_time(2.0, &mut scene);
    scene.camera.fov = 90.0;
    timeline.add_keyframe(&scene).unwrap();

    timeline.set_current_time(1.0, &mut scene);
    assert_eq!(scene.camera.fov, 67.5);
}

#[test]
fn test_orphaned_parent_on_load() {
    let mut source = Scene::new();
    let parent = source.spawn(EntityBlueprint::shape("parent", ShapeKind::Cube)).unwrap();
    let child = source
        .spawn(EntityBlueprint::shape("child", ShapeKind::Sphere).with_parent(ParentRef::Entity(parent)))
        .unwrap();
    let sibling = source.spawn(EntityBlueprint::shape("sibling", ShapeKind::Cone)).unwrap();
    let records: Vec<EntityRecord> = source
        .serialize_entities()
        .into_iter()
        .filter(|r| r.uuid != parent)
        .collect();

    let project = ProjectFile {
        entities: records,
        ..ProjectFile::default()
    };
    let mut studio = Studio::default();
    assert_eq!(studio.load_project(project), 2);

    let scene = &studio.editor.scene;
    let node = scene.objects.get(child).unwrap().node();
    assert_eq!(scene.graph.parent(node), Some(scene.graph.root()));
    assert!(scene.objects.contains(sibling));
    assert_eq!(scene.objects.root_entities(&scene.graph).active.len(), 2);
}

#[test]
fn test_studio_playback_drives_tracks() {
    let mut studio = Studio::default();
    let id = EntityId::new();
    studio
        .editor
        .execute(CreateEntityCommand::new(
            EntityBlueprint::shape("ball", ShapeKind::Sphere).with_id(id),
        ))
        .unwrap();
    let track = studio
        .timeline
        .create_entity_track("ball", id, &studio.editor.scene)
        .unwrap();
    studio.timeline.set_active_track(Some(track)).unwrap();
    studio.timeline.add_keyframe(&studio.editor.scene).unwrap();
    studio.seek(1.0);
    studio
        .editor
        .scene
        .set_entity_transform(id, Transform::from_position([0.0, 10.0, 0.0]))
        .unwrap();
    studio.timeline.add_keyframe(&studio.editor.scene).unwrap();
    studio.seek(0.0);

    let request = studio.play();
    assert!(!studio.editor.scene.camera_controls.enabled);
    let request = studio.tick(request, 0.25).unwrap();
    let request = studio.tick(request, 0.25).unwrap();
    let height = studio.editor.scene.entity_transform(id).unwrap().position[1];
    assert!((height - 5.0).abs() < 1e-4);

    studio.pause();
    assert!(studio.editor.scene.camera_controls.enabled);
    assert!(studio.tick(request, 0.25).is_none());
}
