// End-to-end frames over a small synthetic map, recorded by a mock backend.

use qview_common::bspfile::{BspMap, DEdge, DFace, DLeaf, DNode, DPlane, DTexInfo, MipTex};
use qview_common::palette::Palette;
use qview_common::q_shared::Vec3;
use qview_common::Level;
use qview_renderer::r_image::MipLevel;
use qview_renderer::r_view::ViewSetup;
use qview_renderer::{
    Camera, FrameStats, RenderBackend, RenderError, SurfacePrimitives, SurfaceVertex, TextureFlags,
    TextureHandle, ViewConfig, World,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Upload(usize, usize),
    UploadSurfaces(usize),
    Begin,
    Bind(Option<usize>),
    Draw(usize),
    End,
    Release(usize),
}

#[derive(Default)]
struct MockBackend {
    calls: Vec<Call>,
    fail_draw: bool,
}

impl MockBackend {
    fn frame_calls(&self) -> Vec<Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Begin | Call::Bind(_) | Call::Draw(_) | Call::End))
            .cloned()
            .collect()
    }
}

impl RenderBackend for MockBackend {
    fn upload_texture(&mut self, handle: TextureHandle, _name: &str, levels: &[MipLevel]) -> Result<(), RenderError> {
        self.calls.push(Call::Upload(handle.id, levels.len()));
        Ok(())
    }

    fn upload_surfaces(&mut self, surfaces: &SurfacePrimitives) -> Result<(), RenderError> {
        self.calls.push(Call::UploadSurfaces(surfaces.as_bytes().len()));
        Ok(())
    }

    fn begin_frame(&mut self, _view: &ViewSetup) -> Result<(), RenderError> {
        self.calls.push(Call::Begin);
        Ok(())
    }

    fn bind_texture(&mut self, handle: Option<TextureHandle>) -> Result<(), RenderError> {
        self.calls.push(Call::Bind(handle.map(|h| h.id)));
        Ok(())
    }

    fn draw_polygon(&mut self, vertices: &[SurfaceVertex]) -> Result<(), RenderError> {
        if self.fail_draw {
            return Err(RenderError::Backend("device lost".into()));
        }
        self.calls.push(Call::Draw(vertices.len()));
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        self.calls.push(Call::End);
        Ok(())
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        self.calls.push(Call::Release(handle.id));
    }
}

fn leaf(visofs: i32, first: u16, count: u16) -> DLeaf {
    DLeaf {
        contents: -1,
        visofs,
        first_mark_surface: first,
        num_mark_surfaces: count,
        ..Default::default()
    }
}

fn texinfo(miptex: i32) -> DTexInfo {
    DTexInfo {
        vecs: [[0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
        miptex,
        flags: 0,
    }
}

fn face(first_edge: i32, num_edges: i16, texinfo: i16) -> DFace {
    DFace {
        first_edge,
        num_edges,
        texinfo,
        ..Default::default()
    }
}

fn texture(name: &str, size: u32) -> MipTex {
    MipTex {
        name: name.into(),
        width: size,
        height: size,
        pixels: vec![3; (size * size) as usize],
    }
}

/// One plane at x = 0, normal +X. Leaf 1 (front) sees only itself, leaf 2
/// (back) sees both.
fn split_level() -> Level {
    let bsp = BspMap {
        name: "split".into(),
        planes: vec![DPlane {
            normal: [1.0, 0.0, 0.0],
            dist: 0.0,
            plane_type: 0,
        }],
        nodes: vec![DNode {
            plane_num: 0,
            children: [-2, -3],
            ..Default::default()
        }],
        leafs: vec![
            DLeaf {
                contents: -2,
                visofs: -1,
                ..Default::default()
            },
            leaf(0, 0, 2),
            leaf(1, 2, 1),
        ],
        visibility: vec![0x01, 0x03],
        mark_surfaces: vec![0, 1, 2],
        vertexes: vec![
            [0.0, 0.0, 0.0],
            [0.0, 64.0, 0.0],
            [0.0, 64.0, 64.0],
            [0.0, 0.0, 64.0],
        ],
        edges: vec![
            DEdge { v: [0, 0] },
            DEdge { v: [0, 1] },
            DEdge { v: [1, 2] },
            DEdge { v: [2, 3] },
            DEdge { v: [3, 0] },
        ],
        surf_edges: vec![1, 2, 3, 4, 1, 2, 3, 1, -1],
        faces: vec![face(0, 4, 0), face(4, 3, 1), face(7, 2, 0)],
        texinfo: vec![texinfo(0), texinfo(1)],
        textures: vec![texture("wall", 4), MipTex::missing(), texture("*water", 2), texture("sky1", 2)],
        ..Default::default()
    };
    Level::new(bsp, Palette::from_colors([[10, 20, 30]; 256]))
}

fn init(level: &Level, backend: &mut MockBackend) -> World {
    World::initialize(level, backend, 640, 480, ViewConfig::default()).unwrap()
}

#[test]
fn test_initialize_uploads_textures_then_surfaces() {
    let level = split_level();
    let mut backend = MockBackend::default();
    let world = init(&level, &mut backend);

    assert_eq!(
        backend.calls,
        vec![
            Call::Upload(0, 3),
            Call::Upload(2, 2),
            Call::Upload(3, 2),
            Call::UploadSurfaces(9 * SurfaceVertex::SIZE),
        ]
    );
    assert_eq!(world.textures().len(), 4 + 9 + 2);
    assert_eq!(world.textures().num_uploaded(), 3);
    assert_eq!(world.textures().unpopulated_slots(), 11);
    assert_eq!(world.surfaces().len(), 3);

    let textures = world.textures();
    let wall = textures.slot(0).unwrap();
    assert_eq!(wall.name, "wall");
    assert!(wall.flags.is_empty());
    assert_eq!(wall.handle.map(|h| (h.id, h.width)), Some((0, 4)));

    let missing = textures.slot(1).unwrap();
    assert!(missing.name.is_empty());
    assert_eq!(missing.handle, None);

    // reserved frames follow the table: 9 for "*water", then 2 for "sky1"
    for id in 4..13 {
        let reserved = textures.slot(id).unwrap();
        assert_eq!(reserved.name, "*water");
        assert_eq!(reserved.flags, TextureFlags::ANIMATED);
        assert_eq!(reserved.handle, None);
    }
    assert_eq!(textures.slot(13).unwrap().flags, TextureFlags::SKY);
    assert_eq!(textures.slot(14).unwrap().name, "sky1");
    assert!(textures.slot(15).is_none());
}

#[test]
fn test_front_leaf_draws_only_its_surfaces() {
    let level = split_level();
    let mut backend = MockBackend::default();
    let mut world = init(&level, &mut backend);
    backend.calls.clear();

    let stats = world
        .render_frame(&level, &mut backend, [10.0, 0.0, 0.0], [1.0, 0.0, 0.0])
        .unwrap();

    assert_eq!(
        stats,
        FrameStats {
            leaf: 1,
            visible_surfaces: 2,
            polygons: 2,
            vertices: 7,
        }
    );
    assert_eq!(
        backend.frame_calls(),
        vec![
            Call::Begin,
            Call::Bind(Some(0)),
            Call::Draw(4),
            Call::Bind(None),
            Call::Draw(3),
            Call::End,
        ]
    );
}

#[test]
fn test_back_leaf_skips_degenerate_surface() {
    let level = split_level();
    let mut backend = MockBackend::default();
    let mut world = init(&level, &mut backend);
    backend.calls.clear();

    let stats = world
        .render_frame(&level, &mut backend, [-10.0, 0.0, 0.0], [-1.0, 0.0, 0.0])
        .unwrap();

    assert_eq!(stats.leaf, 2);
    assert_eq!(stats.visible_surfaces, 3);
    assert_eq!(stats.polygons, 2);
    assert_eq!(backend.frame_calls().len(), 6);
    assert_eq!(world.frame_count(), 1);
}

struct FixedCamera {
    origin: Vec3,
    forward: Vec3,
}

impl Camera for FixedCamera {
    fn position(&self) -> Vec3 {
        self.origin
    }

    fn view(&self) -> Vec3 {
        self.forward
    }
}

#[test]
fn test_render_from_camera() {
    let level = split_level();
    let mut backend = MockBackend::default();
    let mut world = init(&level, &mut backend);

    let camera = FixedCamera {
        origin: [32.0, 32.0, 32.0],
        forward: [0.0, 1.0, 0.0],
    };
    let stats = world.render(&level, &mut backend, &camera).unwrap();
    assert_eq!(stats.leaf, 1);
}

#[test]
fn test_shutdown_releases_every_handle() {
    let level = split_level();
    let mut backend = MockBackend::default();
    let world = init(&level, &mut backend);
    backend.calls.clear();

    world.shutdown(&mut backend);
    assert_eq!(
        backend.calls,
        vec![Call::Release(0), Call::Release(2), Call::Release(3)]
    );
}

#[test]
fn test_corrupt_mark_surface_fails_frame() {
    let mut level = split_level();
    level.bsp.mark_surfaces[1] = 40;
    let mut backend = MockBackend::default();
    let mut world = init(&level, &mut backend);

    let err = world
        .render_frame(&level, &mut backend, [10.0, 0.0, 0.0], [1.0, 0.0, 0.0])
        .unwrap_err();
    assert!(matches!(err, RenderError::Map(ref e) if e.is_corrupt()));
    assert!(backend.frame_calls().is_empty());
}

#[test]
fn test_truncated_pvs_never_opens_a_frame() {
    let mut level = split_level();
    level.bsp.leafs[1].visofs = 7;
    let mut backend = MockBackend::default();
    let mut world = init(&level, &mut backend);

    let err = world
        .render_frame(&level, &mut backend, [10.0, 0.0, 0.0], [1.0, 0.0, 0.0])
        .unwrap_err();
    assert!(matches!(err, RenderError::Map(ref e) if e.is_corrupt()));
    assert!(backend.frame_calls().is_empty());
    assert_eq!(world.frame_count(), 0);

    // the back leaf still renders
    let stats = world
        .render_frame(&level, &mut backend, [-10.0, 0.0, 0.0], [-1.0, 0.0, 0.0])
        .unwrap();
    assert_eq!(stats.leaf, 2);
    assert_eq!(backend.frame_calls().first(), Some(&Call::Begin));
}

#[test]
fn test_backend_error_propagates() {
    let level = split_level();
    let mut backend = MockBackend::default();
    let mut world = init(&level, &mut backend);
    backend.fail_draw = true;

    let err = world
        .render_frame(&level, &mut backend, [10.0, 0.0, 0.0], [1.0, 0.0, 0.0])
        .unwrap_err();
    assert!(matches!(err, RenderError::Backend(_)));
}

#[test]
fn test_failed_initialize_releases_textures() {
    let mut level = split_level();
    level.bsp.surf_edges[0] = 99;
    let mut backend = MockBackend::default();

    let result = World::initialize(&level, &mut backend, 640, 480, ViewConfig::default());
    assert!(result.is_err());
    let released = backend
        .calls
        .iter()
        .filter(|c| matches!(c, Call::Release(_)))
        .count();
    assert_eq!(released, 3);
}
