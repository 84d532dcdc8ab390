use std::f32::consts::FRAC_PI_2;
use std::fs;
use std::path::Path;

use glam::{Mat4, Quat, Vec3};
use pixbridge::formats::{Value, read_pim, read_pip, read_pit};
use pixbridge::material::Material;
use pixbridge::formats::PimDialect;
use pixbridge::prefab::{Boundary, LocatorSnapshot, NavigationPoint};
use pixbridge::prelude::*;
use pixbridge::scene::{Face, LocatorData, MeshData, ObjectKind};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

const PRESETS: &str = r#"Flavor {
    Type: "NMAP_TS"
    Name: "tsnmap"
    Texture {
        Tag: "texture_nmap"
        Value: ""
    }
}
Flavor {
    Type: "SPEC"
    Name: "spec"
    Attribute {
        Format: FLOAT3
        Tag: "specular"
        Value: ( 0.5 0.5 0.5 )
    }
}
Shader {
    PresetName: "Diffuse"
    Effect: "eut2.dif"
    Flavors: ( "NMAP_TS" "SPEC" )
    Combinations: ( "tsnmap" "spec" )
    Attribute {
        Format: FLOAT3
        Tag: "diffuse"
        Value: ( 1.0 1.0 1.0 )
    }
    Texture {
        Tag: "texture_base"
        Value: ""
    }
}
"#;

fn catalog() -> ShaderPresetCatalog {
    ShaderPresetCatalog::parse(PRESETS).unwrap()
}

fn session() -> Session {
    Session::new(BridgeConfig::default(), catalog())
}

fn add_root(scene: &mut MemoryScene, game_object: GameObject) -> ObjectId {
    let name = game_object.name.clone();
    scene
        .insert(SceneObject::new(name, ObjectKind::Root(Box::new(game_object))))
        .unwrap()
}

fn global_count(path: &Path, key: &str) -> Option<i64> {
    let file = PixFile::read(path).unwrap();
    file.section("Global")?.prop(key).and_then(Value::as_int)
}

#[test]
fn test_empty_game_object() {
    let dir = tempdir().unwrap();
    let mut scene = MemoryScene::new();
    let root = add_root(&mut scene, GameObject::new_default("empty"));

    let report = export_game_object(&mut session(), &scene, root, dir.path()).unwrap();

    let pim = dir.path().join("empty.pim");
    let pit = dir.path().join("empty.pit");
    assert_eq!(report.written, vec![pim.clone(), pit.clone()]);
    assert_eq!(global_count(&pim, "PieceCount"), Some(0));
    assert_eq!(global_count(&pim, "PartCount"), Some(1));
    assert_eq!(global_count(&pim, "LocatorCount"), Some(0));
    assert_eq!(global_count(&pit, "LookCount"), Some(1));
    assert_eq!(global_count(&pit, "VariantCount"), Some(1));
    assert_eq!(global_count(&pit, "MaterialCount"), Some(0));
    assert!(!dir.path().join("empty.pip").exists());
}

#[test]
fn test_single_triangle_roundtrip() {
    let dir = tempdir().unwrap();
    let mut session = session();
    let mut game_object = GameObject::new_default("tri");
    let mut paint = Material::new("paint", "eut2.dif", &session.catalog).unwrap();
    paint.set_texture("texture_base", "//material/a.tobj").unwrap();
    game_object.looks.add_material(paint).unwrap();

    let mut scene = MemoryScene::new();
    let root = add_root(&mut scene, game_object);
    let positions = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let mesh = MeshData {
        positions: positions.clone(),
        faces: vec![Face {
            vertices: [0, 1, 2],
            material: 0,
        }],
        normals: vec![[0.0, 0.0, 1.0]; 3],
        materials: vec!["paint".to_string()],
        ..MeshData::default()
    };
    scene
        .insert(SceneObject::new("tri_mesh", ObjectKind::Mesh(mesh)).with_parent(root))
        .unwrap();

    export_game_object(&mut session, &scene, root, dir.path()).unwrap();

    let pim = dir.path().join("tri.pim");
    assert_eq!(global_count(&pim, "PieceCount"), Some(1));
    let (model, diagnostics) = read_pim(&pim, false).unwrap();
    assert!(diagnostics.is_empty());
    assert_eq!(model.pieces[0].positions.len(), 3);
    assert_eq!(model.pieces[0].triangles, vec![[0, 1, 2]]);
    assert_eq!(model.materials[0].effect, "eut2.dif");

    let mut reimported = MemoryScene::new();
    let report = import_game_object(&mut session, &pim, &mut reimported).unwrap();
    let ObjectKind::Mesh(mesh) = &reimported.find("piece_0").unwrap().kind else {
        panic!("expected a mesh");
    };
    for (read, written) in mesh.positions.iter().zip(&positions) {
        assert_eq!(read.map(f32::to_bits), written.map(|c: f32| (c + 0.0).to_bits()));
    }
    let root = reimported.object(report.root).unwrap().game_object().unwrap();
    let material = root.looks.material("paint").unwrap();
    assert_eq!(material.base_texture().unwrap().path, "//material/a.tobj");
}

#[test]
fn test_navigation_chain() {
    let dir = tempdir().unwrap();
    let mut session = session();
    let mut scene = MemoryScene::new();
    let root = add_root(&mut scene, GameObject::new_default("crossing"));

    let along_x = Quat::from_rotation_z(-FRAC_PI_2);
    let points: Vec<ObjectId> = (0..4)
        .map(|i| {
            let transform = Mat4::from_rotation_translation(along_x, Vec3::new(i as f32 * 10.0, 0.0, 0.0));
            let locator = PrefabLocator::NavigationPoint(NavigationPoint::default());
            scene
                .insert(
                    SceneObject::new(format!("nav{i}"), ObjectKind::Locator(LocatorData::Prefab(locator)))
                        .with_parent(root)
                        .with_transform(transform),
                )
                .unwrap()
        })
        .collect();
    for pair in points.windows(2) {
        let a = LocatorSnapshot::from_source(&scene, pair[0]).unwrap();
        let b = LocatorSnapshot::from_source(&scene, pair[1]).unwrap();
        session.registry.connect(&a, &b).unwrap();
    }

    export_game_object(&mut session, &scene, root, dir.path()).unwrap();

    let pip = dir.path().join("crossing.pip");
    let file = PixFile::read(&pip).unwrap();
    let links: Vec<(Vec<i64>, Vec<i64>)> = file
        .sections_named("Curve")
        .map(|curve| {
            (
                curve.prop("NextCurves").and_then(Value::as_ints).unwrap().to_vec(),
                curve.prop("PrevCurves").and_then(Value::as_ints).unwrap().to_vec(),
            )
        })
        .collect();
    assert_eq!(
        links,
        vec![
            (vec![1, -1, -1, -1], vec![-1, -1, -1, -1]),
            (vec![2, -1, -1, -1], vec![0, -1, -1, -1]),
            (vec![-1, -1, -1, -1], vec![1, -1, -1, -1]),
        ]
    );

    let (prefab, _) = read_pip(&pip, false).unwrap();
    for curve in &prefab.curves {
        assert!((curve.length - 10.0).abs() < 1e-3, "length {}", curve.length);
    }
}

fn add_nav(scene: &mut MemoryScene, root: ObjectId, name: &str, at: Vec3, nav: NavigationPoint) -> ObjectId {
    let transform = Mat4::from_rotation_translation(Quat::from_rotation_z(-FRAC_PI_2), at);
    let locator = PrefabLocator::NavigationPoint(nav);
    scene
        .insert(
            SceneObject::new(name, ObjectKind::Locator(LocatorData::Prefab(locator)))
                .with_parent(root)
                .with_transform(transform),
        )
        .unwrap()
}

fn connect(session: &mut Session, scene: &MemoryScene, start: ObjectId, end: ObjectId) {
    let a = LocatorSnapshot::from_source(scene, start).unwrap();
    let b = LocatorSnapshot::from_source(scene, end).unwrap();
    session.registry.connect(&a, &b).unwrap();
}

#[test]
fn test_fan_out_beyond_link_width_is_cut() {
    let dir = tempdir().unwrap();
    let mut session = session();
    let mut scene = MemoryScene::new();
    let root = add_root(&mut scene, GameObject::new_default("fan"));

    let entry = add_nav(&mut scene, root, "entry", Vec3::new(-10.0, 0.0, 0.0), NavigationPoint::default());
    let hub = add_nav(&mut scene, root, "hub", Vec3::ZERO, NavigationPoint::default());
    connect(&mut session, &scene, entry, hub);
    for i in 0..5 {
        let exit = add_nav(
            &mut scene,
            root,
            &format!("exit{i}"),
            Vec3::new(10.0, i as f32 * 4.0 - 8.0, 0.0),
            NavigationPoint::default(),
        );
        connect(&mut session, &scene, hub, exit);
    }

    let report = export_game_object(&mut session, &scene, root, dir.path()).unwrap();
    assert_eq!(report.diagnostics.len(), 1);

    let file = PixFile::read(dir.path().join("fan.pip")).unwrap();
    let next: Vec<Vec<i64>> = file
        .sections_named("Curve")
        .map(|curve| curve.prop("NextCurves").and_then(Value::as_ints).unwrap().to_vec())
        .collect();
    assert_eq!(next.len(), 6);
    let full: Vec<&Vec<i64>> = next.iter().filter(|links| !links.contains(&-1)).collect();
    assert_eq!(full.len(), 1);
    assert_eq!(full[0].len(), 4);
}

#[test]
fn test_failed_export_writes_nothing() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    let mut session = session();
    let mut scene = MemoryScene::new();
    let root = add_root(&mut scene, GameObject::new_default("x"));

    let entry = NavigationPoint {
        boundary: Boundary::Input,
        boundary_node: 5,
        ..NavigationPoint::default()
    };
    let a = add_nav(&mut scene, root, "a", Vec3::ZERO, entry);
    let b = add_nav(&mut scene, root, "b", Vec3::new(10.0, 0.0, 0.0), NavigationPoint::default());
    connect(&mut session, &scene, a, b);

    let err = export_game_object(&mut session, &scene, root, &out).unwrap_err();
    assert!(matches!(err, Error::BoundaryOutOfRange { node: 5, .. }), "{err:?}");
    assert!(!out.exists());
}

#[test]
fn test_exchange_model_keeps_its_dialect() {
    let dir = tempdir().unwrap();
    let source_dir = dir.path().join("source");
    let exchange = BridgeConfig::from_toml_str("[export]\npim_dialect = \"exchange\"\n").unwrap();
    let mut scene = MemoryScene::new();
    let root = add_root(&mut scene, GameObject::new_default("m"));
    let written = export_game_object(&mut Session::new(exchange, catalog()), &scene, root, &source_dir)
        .unwrap()
        .written;
    let model = source_dir.join("m.pim.ef");
    assert_eq!(written[0], model);

    let mut session = session();
    let mut reimported = MemoryScene::new();
    let report = import_game_object(&mut session, &model, &mut reimported).unwrap();
    let game_object = reimported.object(report.root).unwrap().game_object().unwrap();
    assert_eq!(game_object.source_dialect, Some(PimDialect::Exchange));

    let out = dir.path().join("out");
    let again = export_game_object(&mut session, &reimported, report.root, &out).unwrap();
    assert_eq!(again.written[0], out.join("m.pim.ef"));
    let (model, _) = read_pim(&again.written[0], false).unwrap();
    assert_eq!(model.dialect, PimDialect::Exchange);

    let created = add_root(&mut reimported, GameObject::new_default("fresh"));
    let fresh = export_game_object(&mut session, &reimported, created, &out).unwrap();
    assert_eq!(fresh.written[0], out.join("fresh.pim"));
}

#[test]
fn test_variant_masking() {
    let dir = tempdir().unwrap();
    let mut game_object = GameObject::new_default("truck");
    game_object.rename_part("defaultpart", "cab").unwrap();
    game_object.add_part("chassis").unwrap();
    game_object.add_variant("naked").unwrap();
    game_object.set_included("naked", "cab", false).unwrap();

    let mut scene = MemoryScene::new();
    let root = add_root(&mut scene, game_object);
    export_game_object(&mut session(), &scene, root, dir.path()).unwrap();

    let (traits, _) = read_pit(dir.path().join("truck.pit"), false).unwrap();
    assert_eq!(traits.variants.len(), 2);
    let naked = &traits.variants[1];
    assert_eq!(naked.name, "naked");
    assert_eq!(naked.includes("cab"), Some(false));
    assert_eq!(naked.includes("chassis"), Some(true));
    assert_eq!(traits.variants[0].includes("cab"), Some(true));
}

#[test]
fn test_look_switching_preserves_values() {
    let catalog = catalog();
    let mut game_object = GameObject::new_default("bus");
    game_object.looks.rename_look("default", "day").unwrap();
    game_object
        .looks
        .add_material(Material::new("paint", "eut2.dif", &catalog).unwrap())
        .unwrap();
    game_object
        .looks
        .material_mut("paint")
        .unwrap()
        .set_attribute("diffuse", &[1.0, 0.0, 0.0])
        .unwrap();
    game_object.looks.add_look("night").unwrap();
    game_object.looks.set_active("night").unwrap();
    game_object
        .looks
        .material_mut("paint")
        .unwrap()
        .set_attribute("diffuse", &[0.0, 0.0, 1.0])
        .unwrap();

    game_object.looks.set_active("day").unwrap();
    game_object.looks.set_active("night").unwrap();
    game_object.looks.set_active("day").unwrap();
    let diffuse = game_object.looks.material("paint").unwrap().attribute("diffuse").unwrap();
    assert_eq!(diffuse.iter().map(|c| c.to_bits()).collect::<Vec<_>>(), [1.0f32, 0.0, 0.0].map(f32::to_bits));
}

#[test]
fn test_unknown_flavor_combination_refused() {
    let catalog = catalog();
    let mut material = Material::new("paint", "eut2.dif", &catalog).unwrap();
    material.toggle_flavor(&catalog, "NMAP_TS", true).unwrap();
    assert_eq!(material.effect, "eut2.dif.tsnmap");

    let before = material.clone();
    let err = material.toggle_flavor(&catalog, "SPEC", true).unwrap_err();
    assert!(matches!(err, Error::UnknownFlavor { .. }));
    assert_eq!(material, before);
}

#[test]
fn test_resolver_alternative_base_and_infix() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("mod_x/dlc_north");
    fs::create_dir_all(&root).unwrap();
    let world = dir.path().join("mod_x/base/def/world");
    fs::create_dir_all(&world).unwrap();
    let plain = world.join("sign.sii");
    fs::write(&plain, "SiiNunit {\nsign : s.one { v: 1 }\n}\n").unwrap();

    let resolver = ProjectResolver::new(&root, true);
    assert_eq!(resolver.resolve("//def/world/sign.sii").unwrap(), plain);
    assert_eq!(resolver.resolve_library("//def/world/sign.sii").unwrap(), vec![plain.clone()]);

    let infixed = world.join("sign.dlc_north.sii");
    fs::write(&infixed, "SiiNunit {\nsign : s.two { v: 2 }\n}\n").unwrap();
    assert_eq!(
        resolver.resolve_library("//def/world/sign.sii").unwrap(),
        vec![plain, infixed]
    );
    let library = resolver.load_library("//def/world/sign.sii").unwrap();
    assert!(library.unit("s.one").is_some());
    assert!(library.unit("s.two").is_some());
}

#[test]
fn test_config_overrides_export_scale() {
    let config = BridgeConfig::from_toml_str("[export]\nexport_scale = 2.0\n").unwrap();
    assert_eq!(config.export.export_scale, 2.0);
    assert_eq!(config.import.import_scale, 1.0);
}
