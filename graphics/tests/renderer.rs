//! Whole frames through the scene renderer on the dummy backend.

mod common;

use std::sync::Arc;

use rstest::{fixture, rstest};

use glam::Vec2;

use common::{
    Producer, STONE, TERRAIN, blit_sizes, draws_in_pass, dummy_device, pass_labels, request,
    texture_sizes,
};
use lumen_core::scene::{Landscape, Transform};
use lumen_graphics::commands::{Command, DepthTest};
use lumen_graphics::settings::{AntiAliasingMode, SuperResolutionMode};
use lumen_graphics::{
    DummyBackend, Extent2d, FrameOutput, GraphicsDevice, PassKind, PostStage, ProxySource,
    RenderSettings, RendererConfig, SceneRenderer, ScreenshotRequest, SettingsOverride,
    TextureDescriptor, TextureFormat, TextureUsage,
};

struct Fixture {
    device: Arc<GraphicsDevice>,
    backend: Arc<DummyBackend>,
    producer: Producer,
    renderer: SceneRenderer,
}

impl Fixture {
    fn output(&self, width: u32, height: u32) -> FrameOutput {
        let descriptor = TextureDescriptor::from_extent(
            Extent2d::new(width, height),
            TextureFormat::Rgba8UnormSrgb,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_DST | TextureUsage::COPY_SRC,
        )
        .with_label("Test.Output");
        FrameOutput::new(self.device.create_texture(&descriptor).expect("output texture"))
    }
}

#[fixture]
fn demo() -> Fixture {
    let (device, backend) = dummy_device();
    let producer = Producer::demo(&device);
    let renderer = SceneRenderer::with_assets(
        Arc::clone(&device),
        Arc::clone(&producer.assets),
        RendererConfig::default(),
    )
    .expect("renderer");
    Fixture {
        device,
        backend,
        producer,
        renderer,
    }
}

fn index_of(labels: &[String], label: &str) -> usize {
    labels
        .iter()
        .position(|l| l == label)
        .unwrap_or_else(|| panic!("{label} not recorded in {labels:?}"))
}

#[rstest]
fn test_full_frame_runs_every_step_in_order(mut demo: Fixture) {
    let output = demo.output(1280, 720);
    let mut proxy = demo.producer.build(request(1, 1280, 720));

    let report = demo.renderer.render(&mut proxy, &output);

    assert_eq!(
        report.passes,
        vec![
            PassKind::DepthPrepass,
            PassKind::DirectionalShadows,
            PassKind::OmniShadows,
            PassKind::VolumetricClouds,
            PassKind::GodRays,
            PassKind::GBuffer,
            PassKind::Ssao,
            PassKind::ClearLighting,
            PassKind::DirectLighting,
            PassKind::IndirectLighting,
            PassKind::Emissive,
            PassKind::Ssr,
            PassKind::VolumetricComposite,
            PassKind::Translucency,
            PassKind::Post(PostStage::Bloom),
            PassKind::Post(PostStage::ToneMapping),
            PassKind::Post(PostStage::Taa),
        ]
    );
    assert!(report.targets_reallocated);
    assert!(report.draw_count > 0);
    assert_eq!(report.resolution.internal, Extent2d::new(1280, 720));

    let lists = demo.backend.submitted_lists();
    assert_eq!(lists.len(), 1);
    let labels = pass_labels(&lists[0]);
    assert!(index_of(&labels, "DepthPrepass") < index_of(&labels, "Shadow.Cascade0"));
    assert!(index_of(&labels, "Shadow.Omni0.Face5") < index_of(&labels, "GBuffer"));
    assert!(index_of(&labels, "GBuffer") < index_of(&labels, "SSAO"));
    assert!(index_of(&labels, "ClearLighting") < index_of(&labels, "DirectLighting"));
    assert!(index_of(&labels, "VolumetricComposite") < index_of(&labels, "Translucency"));
    assert!(index_of(&labels, "Translucency") < index_of(&labels, "Post.ToneMapping"));
    assert_eq!(demo.renderer.frame_fence().completed_value(), 1);
}

#[rstest]
fn test_full_resolution_writes_output_without_blit(mut demo: Fixture) {
    let output = demo.output(1280, 720);
    let mut proxy = demo.producer.build(request(1, 1280, 720));

    let report = demo.renderer.render(&mut proxy, &output);

    assert!(!report.ran(PassKind::Blit));
    let list = &demo.backend.submitted_lists()[0];
    let Some(Command::BeginRenderPass { colors, .. }) = list.find_render_pass("Post.TAA") else {
        panic!("TAA not recorded");
    };
    assert_eq!(colors[0].texture, output.texture().id());
}

#[rstest]
fn test_half_scale_upsamples_into_output(mut demo: Fixture) {
    let output = demo.output(1920, 1080);
    let settings = RenderSettings {
        resolution_scale_percent: 50,
        ..Default::default()
    };
    let mut proxy = demo
        .producer
        .build(request(1, 1920, 1080).with_settings(settings));

    let report = demo.renderer.render(&mut proxy, &output);

    assert_eq!(report.resolution.internal, Extent2d::new(960, 540));
    assert_eq!(report.passes.last(), Some(&PassKind::Blit));
    let sizes = texture_sizes(&demo.backend.events());
    let blits = blit_sizes(&demo.backend.submitted_lists()[0], &sizes);
    assert_eq!(
        blits,
        vec![(Extent2d::new(960, 540), Extent2d::new(1920, 1080))]
    );
}

#[rstest]
#[case::defaults(RenderSettings::default(), &[PostStage::Bloom, PostStage::ToneMapping, PostStage::Taa])]
#[case::all_off(
    RenderSettings { bloom: false, anti_aliasing: AntiAliasingMode::Off, ..Default::default() },
    &[PostStage::ToneMapping]
)]
#[case::fxaa_dof(
    RenderSettings { bloom: false, anti_aliasing: AntiAliasingMode::Fxaa, depth_of_field: true, ..Default::default() },
    &[PostStage::ToneMapping, PostStage::Fxaa, PostStage::DepthOfField]
)]
#[case::super_resolution(
    RenderSettings { super_resolution: SuperResolutionMode::Quality, ..Default::default() },
    &[PostStage::Bloom, PostStage::ToneMapping, PostStage::Taa, PostStage::SuperResolution]
)]
fn test_post_chain_follows_settings(
    mut demo: Fixture,
    #[case] settings: RenderSettings,
    #[case] expected: &[PostStage],
) {
    let output = demo.output(1280, 720);
    let mut proxy = demo
        .producer
        .build(request(1, 1280, 720).with_settings(settings));

    let report = demo.renderer.render(&mut proxy, &output);

    assert_eq!(report.post_stages(), expected);
    assert_eq!(report.post_plan.final_stage(), expected.last().copied());
    assert!(!report.ran(PassKind::Blit));
}

#[rstest]
#[case::radiance(ProxySource::RadianceCapture)]
#[case::irradiance(ProxySource::IrradianceCapture)]
fn test_probe_captures_skip_post(mut demo: Fixture, #[case] source: ProxySource) {
    let output = demo.output(256, 256);
    let capture = request(1, 256, 256)
        .with_source(source)
        .with_override(SettingsOverride::capture());
    let mut proxy = demo.producer.build(capture);

    let report = demo.renderer.render(&mut proxy, &output);

    assert!(report.post_plan.is_empty());
    assert!(report.post_stages().is_empty());
    assert_eq!(report.passes.last(), Some(&PassKind::Blit));
    let labels = pass_labels(&demo.backend.submitted_lists()[0]);
    assert!(labels.iter().all(|label| !label.starts_with("Post.")));
}

#[rstest]
fn test_scene_capture_keeps_post(mut demo: Fixture) {
    let output = demo.output(512, 512);
    let mut proxy = demo
        .producer
        .build(request(1, 512, 512).with_source(ProxySource::SceneCapture));

    let report = demo.renderer.render(&mut proxy, &output);

    assert!(report.post_stages().contains(&PostStage::ToneMapping));
}

#[rstest]
#[case::with_prepass(true, DepthTest::Equal, false)]
#[case::without_prepass(false, DepthTest::LessEqual, true)]
fn test_gbuffer_depth_follows_prepass(
    mut demo: Fixture,
    #[case] prepass: bool,
    #[case] test: DepthTest,
    #[case] write: bool,
) {
    let output = demo.output(1280, 720);
    let settings = RenderSettings {
        depth_prepass: prepass,
        ..Default::default()
    };
    let mut proxy = demo
        .producer
        .build(request(1, 1280, 720).with_settings(settings));

    let report = demo.renderer.render(&mut proxy, &output);

    assert_eq!(report.ran(PassKind::DepthPrepass), prepass);
    let list = &demo.backend.submitted_lists()[0];
    let Some(Command::BeginRenderPass { depth: Some(depth), .. }) = list.find_render_pass("GBuffer")
    else {
        panic!("GBuffer pass without depth");
    };
    assert_eq!(depth.test, test);
    assert_eq!(depth.write, write);
}

#[rstest]
fn test_disabled_ssao_clears_to_white(mut demo: Fixture) {
    let output = demo.output(1280, 720);
    let settings = RenderSettings {
        ssao: false,
        ..Default::default()
    };
    let mut proxy = demo
        .producer
        .build(request(1, 1280, 720).with_settings(settings));

    let report = demo.renderer.render(&mut proxy, &output);

    assert!(!report.ran(PassKind::Ssao));
    let labels = pass_labels(&demo.backend.submitted_lists()[0]);
    assert!(labels.iter().any(|l| l == "SSAO.Clear"));
    assert!(labels.iter().all(|l| l != "SSAO"));
}

#[rstest]
fn test_shadows_off_skips_shadow_passes(mut demo: Fixture) {
    let output = demo.output(1280, 720);
    let settings = RenderSettings {
        shadows: false,
        volumetric_clouds: false,
        god_rays: false,
        ..Default::default()
    };
    let mut proxy = demo
        .producer
        .build(request(1, 1280, 720).with_settings(settings));

    let report = demo.renderer.render(&mut proxy, &output);

    assert!(!report.ran(PassKind::DirectionalShadows));
    assert!(!report.ran(PassKind::OmniShadows));
    assert!(!report.ran(PassKind::VolumetricComposite));
    let labels = pass_labels(&demo.backend.submitted_lists()[0]);
    assert!(labels.iter().all(|l| !l.starts_with("Shadow.")));
}

#[rstest]
fn test_prepass_and_gbuffer_agree_on_evicted_materials(mut demo: Fixture) {
    let output = demo.output(1280, 720);
    let mut proxy = demo.producer.build(request(1, 1280, 720));
    assert!(demo.producer.assets.evict_material(STONE));

    let report = demo.renderer.render(&mut proxy, &output);

    assert!(report.ran(PassKind::DepthPrepass));
    let list = &demo.backend.submitted_lists()[0];
    let prepass = draws_in_pass(list, "DepthPrepass");
    assert_eq!(prepass, draws_in_pass(list, "GBuffer"));
    // Only the terrain is left.
    assert_eq!(prepass, 1);
}

#[rstest]
fn test_oversized_landscape_renders_without_it(mut demo: Fixture) {
    let world = &mut demo.producer.world;
    let huge = world.spawn("HugeTerrain", Transform::IDENTITY);
    world
        .actor_mut(huge)
        .expect("spawned")
        .add_component(Landscape {
            material: Some(TERRAIN),
            size: Vec2::splat(4096.0),
            patches: 40_000,
            ..Default::default()
        });
    let output = demo.output(1280, 720);
    let mut proxy = demo.producer.build(request(1, 1280, 720));

    let report = demo.renderer.render(&mut proxy, &output);

    assert!(report.ran(PassKind::GBuffer));
    let list = &demo.backend.submitted_lists()[0];
    assert_eq!(draws_in_pass(list, "GBuffer"), 4);
}

#[rstest]
fn test_translucent_meshes_drawn_back_to_front(mut demo: Fixture) {
    let bits = |name: &str| {
        demo.producer
            .world
            .iter_actors()
            .find(|(_, actor)| actor.name() == name)
            .map(|(id, _)| id.to_bits())
            .expect("actor exists")
    };
    let far = bits("GlassFar");
    let near = bits("GlassNear");
    let output = demo.output(1280, 720);
    let mut proxy = demo.producer.build(request(1, 1280, 720));

    demo.renderer.render(&mut proxy, &output);

    assert_eq!(demo.renderer.translucent_draw_order(), &[far, near]);
}

#[rstest]
fn test_targets_reused_until_size_changes(mut demo: Fixture) {
    let small = demo.output(640, 360);
    let large = demo.output(1280, 720);

    let mut reallocated = Vec::new();
    for (frame, output) in [(1, &small), (2, &small), (3, &large), (4, &large)] {
        let extent = output.extent();
        let mut proxy = demo
            .producer
            .build(request(frame, extent.width, extent.height));
        reallocated.push(demo.renderer.render(&mut proxy, output).targets_reallocated);
    }

    assert_eq!(reallocated, vec![true, false, true, false]);
    assert_eq!(demo.renderer.targets().reallocation_count(), 2);
    assert_eq!(demo.renderer.last_frame(), Some(4));
}

#[rstest]
fn test_screenshot_at_output_size(mut demo: Fixture) {
    let output = demo.output(1280, 720);
    let (screenshot, receiver) = ScreenshotRequest::new(None);
    let mut proxy = demo
        .producer
        .build(request(3, 1280, 720).with_screenshot(screenshot));

    let report = demo.renderer.render(&mut proxy, &output);

    assert!(report.screenshot_delivered);
    assert!(report.ran(PassKind::Readback));
    let image = receiver.try_recv().expect("screenshot delivered");
    assert_eq!(image.frame_number, 3);
    assert_eq!((image.width, image.height), (1280, 720));
    assert_eq!(image.pixels.len(), 1280 * 720 * 4);
}

#[rstest]
fn test_screenshot_resized(mut demo: Fixture) {
    let output = demo.output(1280, 720);
    let (screenshot, receiver) = ScreenshotRequest::new(Some(Extent2d::new(320, 180)));
    let mut proxy = demo
        .producer
        .build(request(1, 1280, 720).with_screenshot(screenshot));

    demo.renderer.render(&mut proxy, &output);

    let image = receiver.try_recv().expect("screenshot delivered");
    assert_eq!((image.width, image.height), (320, 180));
    assert!(
        common::created_textures(&demo.backend.events())
            .iter()
            .any(|label| label == "Screenshot.Resize")
    );
}

#[rstest]
fn test_dropped_screenshot_receiver_is_not_fatal(mut demo: Fixture) {
    let output = demo.output(640, 360);
    let (screenshot, receiver) = ScreenshotRequest::new(None);
    drop(receiver);
    let mut proxy = demo
        .producer
        .build(request(1, 640, 360).with_screenshot(screenshot));

    let report = demo.renderer.render(&mut proxy, &output);

    assert!(!report.screenshot_delivered);
}

#[rstest]
#[should_panic(expected = "frame 1 rendered after frame 2")]
fn test_out_of_order_frame_is_fatal(mut demo: Fixture) {
    let output = demo.output(640, 360);
    let mut second = demo.producer.build(request(2, 640, 360));
    let mut first = demo.producer.build(request(1, 640, 360));

    demo.renderer.render(&mut second, &output);
    demo.renderer.render(&mut first, &output);
}

#[rstest]
#[should_panic(expected = "SceneRenderTargets: creating")]
fn test_target_creation_failure_is_fatal(mut demo: Fixture) {
    let output = demo.output(640, 360);
    let mut proxy = demo.producer.build(request(1, 640, 360));
    demo.backend.set_fail_texture_creation(true);

    demo.renderer.render(&mut proxy, &output);
}

#[rstest]
fn test_shutdown_releases_targets(mut demo: Fixture) {
    let output = demo.output(640, 360);
    let mut proxy = demo.producer.build(request(1, 640, 360));
    demo.renderer.render(&mut proxy, &output);

    demo.renderer.shutdown();
    demo.renderer.shutdown();

    assert!(!demo.renderer.is_initialized());
    // Only the caller's output and the renderer-independent assets remain.
    drop(output);
    assert_eq!(demo.backend.live_texture_count(), 0);
}
