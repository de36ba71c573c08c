//! xmiplay — plays an XMI file to a MIDI output port.
//!
//! Usage:
//!   xmiplay <file.xmi>
//!   xmiplay <file.xmi> --info
//!   xmiplay <file.xmi> --loop --rate 48000 --port 1
//!   xmiplay --list-ports

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use xmi_engine::{Sequencer, SequencerConfig};
use xmi_midi::{pump, quiet_all, MidirOutput};

fn usage() -> ! {
    eprintln!("Usage: xmiplay <file.xmi> [--info] [--loop] [--rate HZ] [--port N]");
    eprintln!("       xmiplay --list-ports");
    std::process::exit(1);
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--list-ports") {
        list_ports();
        return;
    }

    let path = match args.get(1) {
        Some(p) if !p.starts_with("--") => p.clone(),
        _ => usage(),
    };

    let flag_value = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .and_then(|s| s.parse::<usize>().ok())
    };

    let config = SequencerConfig {
        sample_rate: flag_value("--rate").map(|r| r as u32).unwrap_or(44100),
        looping: args.iter().any(|a| a == "--loop"),
        ..SequencerConfig::default()
    };

    if args.iter().any(|a| a == "--info") {
        print_info(&path);
        return;
    }

    play(&path, config, flag_value("--port"));
}

fn list_ports() {
    let ports = MidirOutput::ports().unwrap_or_else(|e| {
        eprintln!("Failed to query MIDI ports: {}", e);
        std::process::exit(1);
    });
    if ports.is_empty() {
        println!("No MIDI output ports.");
        return;
    }
    for (i, name) in ports.iter().enumerate() {
        println!("{:2}  {}", i, name);
    }
}

fn print_info(path: &str) {
    let data = std::fs::read(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path, e);
        std::process::exit(1);
    });
    let info = xmi_formats::probe(&data).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {}", path, e);
        std::process::exit(1);
    });

    println!("Duration: {:.1}s", info.duration_seconds);
    println!("Tempo:    {:.1} BPM", info.bpm);
    println!("Time sig: {}/{}", info.time_sig_num, info.time_sig_den);
    println!("Events:   {}", info.event_count);
}

fn play(path: &str, config: SequencerConfig, port: Option<usize>) {
    let (mut seq, mut consumer) = Sequencer::from_file(path, config).unwrap_or_else(|e| {
        eprintln!("Failed to load {}: {}", path, e);
        std::process::exit(1);
    });

    let mut sink = MidirOutput::connect(port).unwrap_or_else(|e| {
        eprintln!("Failed to open MIDI output: {}", e);
        std::process::exit(1);
    });
    println!("MIDI output: {}", sink.port_name);
    println!("Playing at {} Hz...", config.sample_rate);

    // Consumer side: drain the command queue on its own thread until
    // the producer signals it is done, then silence every channel.
    let done = Arc::new(AtomicBool::new(false));
    let consumer_done = done.clone();
    let drainer = thread::spawn(move || {
        loop {
            if let Err(e) = pump(&mut consumer, &mut sink) {
                eprintln!("MIDI send failed: {}", e);
                break;
            }
            if consumer_done.load(Ordering::Relaxed) {
                let _ = pump(&mut consumer, &mut sink);
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        if let Err(e) = quiet_all(&mut sink) {
            eprintln!("Failed to quiet channels: {}", e);
        }
    });

    // Producer side: advance the song clock to match wall time.
    let start = Instant::now();
    let rate = config.sample_rate as f64;
    let mut advanced: u64 = 0;
    let mut last_report = Instant::now();

    while seq.is_loaded() {
        let target = (start.elapsed().as_secs_f64() * rate) as u64;
        if target > advanced {
            seq.advance(target - advanced);
            advanced = target;
        }
        if last_report.elapsed() >= Duration::from_millis(500) {
            print!("\rTime: {:7.1}s", seq.song_time());
            use std::io::Write;
            let _ = std::io::stdout().flush();
            last_report = Instant::now();
        }
        thread::sleep(Duration::from_millis(5));
    }

    done.store(true, Ordering::Relaxed);
    drainer.join().ok();
    println!("\rDone.          ");
}
