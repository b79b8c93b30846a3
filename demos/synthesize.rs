use std::time::Instant;

use tts_mcp::{Config, Router, SynthesisRequestBuilder};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::default();
    config.ensure_dirs()?;
    let router = Router::with_default_engines(&config);

    let init_start = Instant::now();
    router.initialize_all().await;
    println!("Engines initialized in {:.2?}", init_start.elapsed());

    let health = router.health().await;
    for engine in &health.engines {
        println!(
            "{:<8} available={} voices={}",
            engine.name, engine.available, engine.voice_count
        );
    }

    let english = router.list_voices(None, Some("en"), None).await?;
    println!(
        "English voices: {:?}",
        english.iter().map(|v| v.id.as_str()).collect::<Vec<_>>()
    );

    let text = "Hello! This is a local text to speech server. \
                It can speak through Kokoro or through the system voice.";
    let request = SynthesisRequestBuilder::default().text(text).build()?;

    let synth_start = Instant::now();
    let result = router.synthesize(request).await?;
    let synth_dur = synth_start.elapsed();

    match result.audio_duration_secs {
        Some(audio_duration) => println!(
            "Synthesized {:.2}s audio with {} in {:.2?} ({:.1}x real-time)",
            audio_duration,
            result.engine,
            synth_dur,
            audio_duration / synth_dur.as_secs_f64()
        ),
        None => println!("Synthesized with {} in {:.2?}", result.engine, synth_dur),
    }
    println!("Saved to {}", result.path.display());

    router.cleanup().await;
    Ok(())
}
