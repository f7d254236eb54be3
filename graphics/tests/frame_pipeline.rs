//! Producer/render-thread handoff.

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{Producer, created_textures, dummy_device, request, upload_assets};
use lumen_core::scene::World;
use lumen_graphics::{
    BuildSceneProxy, DummyBackend, Extent2d, FramePipeline, GraphicsDevice, LightProbeConfig,
    LightProbeSystem, PipelineConfig, ProxyRequest, SceneProxy, ScreenshotRequest,
};

type Harness = (Arc<GraphicsDevice>, Arc<DummyBackend>, FramePipeline, Producer);

fn start(frames_in_flight: usize) -> Harness {
    let (device, backend) = dummy_device();
    let config = PipelineConfig {
        frames_in_flight,
        ..Default::default()
    };
    let pipeline = FramePipeline::spawn(Arc::clone(&device), config).expect("pipeline");
    upload_assets(&device, pipeline.assets());
    let producer = Producer {
        world: common::demo_world(),
        probes: LightProbeSystem::new(LightProbeConfig::default()),
        assets: Arc::clone(pipeline.assets()),
    };
    (device, backend, pipeline, producer)
}

fn build(pipeline: &mut FramePipeline, producer: &mut Producer, request: ProxyRequest) -> SceneProxy {
    let arena = pipeline.acquire_arena();
    producer.build_into(request, arena)
}

#[rstest]
#[case::single(1)]
#[case::double(2)]
#[case::triple(3)]
fn test_frames_complete_in_submission_order(#[case] frames_in_flight: usize) {
    let (_device, backend, mut pipeline, mut producer) = start(frames_in_flight);

    for frame in 1..=10 {
        let proxy = build(&mut pipeline, &mut producer, request(frame, 640, 360));
        pipeline.submit(proxy);
    }
    let mut done = pipeline.wait_for_frame(10);
    done.extend(pipeline.shutdown());

    let frames: Vec<u64> = done.iter().map(|c| c.frame_number).collect();
    assert_eq!(frames, (1..=10).collect::<Vec<_>>());
    assert!(done.iter().all(|c| c.report.frame_number == c.frame_number));
    assert_eq!(backend.submission_count(), 10);
    assert!(!pipeline.is_running());
}

#[test]
fn test_try_submit_hands_back_the_proxy_when_full() {
    let (_device, _backend, mut pipeline, mut producer) = start(1);

    let mut rejected = 0;
    for frame in 1..=20 {
        let mut proxy = build(&mut pipeline, &mut producer, request(frame, 320, 180));
        loop {
            match pipeline.try_submit(proxy) {
                Ok(()) => break,
                Err(returned) => {
                    assert_eq!(returned.frame_number(), frame);
                    assert!(returned.is_finalized());
                    rejected += 1;
                    proxy = returned;
                    std::thread::yield_now();
                }
            }
        }
    }
    let done = pipeline.shutdown();

    log::debug!("try_submit rejected {rejected} times");
    assert_eq!(pipeline.last_submitted(), Some(20));
    assert_eq!(done.len(), 20);
}

#[test]
fn test_wait_for_frame_buffers_later_frames() {
    let (_device, _backend, mut pipeline, mut producer) = start(4);

    for frame in 1..=4 {
        let proxy = build(&mut pipeline, &mut producer, request(frame, 320, 180));
        pipeline.submit(proxy);
    }

    let first: Vec<u64> = pipeline
        .wait_for_frame(2)
        .iter()
        .map(|c| c.frame_number)
        .collect();
    assert_eq!(first, vec![1, 2]);
    assert!(pipeline.wait_for_frame(2).is_empty());

    let rest: Vec<u64> = pipeline
        .wait_for_frame(4)
        .iter()
        .map(|c| c.frame_number)
        .collect();
    assert_eq!(rest, vec![3, 4]);
}

#[test]
fn test_arenas_are_recycled() {
    let (_device, _backend, mut pipeline, mut producer) = start(2);

    for frame in 1..=30 {
        for completion in pipeline.poll_completed() {
            pipeline.recycle(completion);
        }
        let proxy = build(&mut pipeline, &mut producer, request(frame, 320, 180));
        pipeline.submit(proxy);
    }
    for completion in pipeline.wait_for_frame(30) {
        pipeline.recycle(completion);
    }

    let created = pipeline.arena_pool().created_count();
    assert!(created <= pipeline.frames_in_flight() + 2, "created {created} arenas");
    assert!(pipeline.arena_pool().available() >= 1);
}

#[test]
fn test_output_follows_requested_extent() {
    let (_device, backend, mut pipeline, mut producer) = start(2);

    let sizes = [(640, 360), (640, 360), (1280, 720), (1280, 720)];
    for (frame, (width, height)) in (1..).zip(sizes) {
        let proxy = build(&mut pipeline, &mut producer, request(frame, width, height));
        pipeline.submit(proxy);
    }
    let done = pipeline.shutdown();

    let reallocated: Vec<bool> = done.iter().map(|c| c.report.targets_reallocated).collect();
    assert_eq!(reallocated, vec![true, false, true, false]);
    assert_eq!(done[3].report.resolution.output, Extent2d::new(1280, 720));
    let outputs = created_textures(&backend.events())
        .into_iter()
        .filter(|label| label == "Frame.Output")
        .count();
    assert_eq!(outputs, 2);
    // Shutdown released the renderer's targets and the output.
    assert_eq!(backend.live_texture_count(), 0);
}

#[test]
fn test_screenshot_arrives_from_render_thread() {
    let (_device, _backend, mut pipeline, mut producer) = start(2);
    let (screenshot, receiver) = ScreenshotRequest::new(Some(Extent2d::new(64, 64)));

    let proxy = build(
        &mut pipeline,
        &mut producer,
        request(1, 640, 360).with_screenshot(screenshot),
    );
    pipeline.submit(proxy);
    let done = pipeline.wait_for_frame(1);

    assert!(done[0].report.screenshot_delivered);
    let image = receiver.try_recv().expect("screenshot");
    assert_eq!((image.width, image.height), (64, 64));
}

#[test]
fn test_shutdown_renders_queued_frames() {
    let (_device, _backend, mut pipeline, mut producer) = start(3);

    for frame in 1..=3 {
        let proxy = build(&mut pipeline, &mut producer, request(frame, 320, 180));
        pipeline.submit(proxy);
    }
    let done = pipeline.shutdown();

    assert_eq!(done.len(), 3);
    assert!(pipeline.shutdown().is_empty());
}

#[test]
fn test_empty_world_renders() {
    let (_device, _backend, mut pipeline, _producer) = start(1);
    let mut world = World::new();
    let mut probes = LightProbeSystem::new(LightProbeConfig::default());

    let arena = pipeline.acquire_arena();
    let assets = Arc::clone(pipeline.assets());
    let proxy = world.build_scene_proxy(request(1, 320, 180), arena, &mut probes, &assets);
    pipeline.submit(proxy);
    let done = pipeline.wait_for_frame(1);

    assert_eq!(done.len(), 1);
    assert!(done[0].report.draw_count > 0);
}

#[test]
#[should_panic(expected = "submitted before finalize")]
fn test_unfinalized_proxy_is_rejected() {
    let (_device, _backend, mut pipeline, _producer) = start(1);
    let arena = pipeline.acquire_arena();

    pipeline.submit(SceneProxy::new(request(1, 320, 180), arena));
}

#[test]
#[should_panic(expected = "frame 2 submitted after frame 5")]
fn test_out_of_order_submission_is_fatal() {
    let (_device, _backend, mut pipeline, mut producer) = start(2);

    let late = build(&mut pipeline, &mut producer, request(5, 320, 180));
    pipeline.submit(late);
    let early = build(&mut pipeline, &mut producer, request(2, 320, 180));
    pipeline.submit(early);
}
