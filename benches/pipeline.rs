//! Benchmarks for log parsing and scenario runs

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use wurlink::{CapturedPacket, EventLog, PacketLengthIndex, PowerEngine, Scenario, TimeFormat};

const SESSION: &[(&str, Option<u32>)] = &[
    ("Wake-up radio is checking for a signal", None),
    ("Wake-up signal detected", None),
    ("BLE device is now awake and communicating", None),
    ("BLE device is transmitting advertising indication", Some(19)),
    ("BLE device is receiving connection indication", Some(39)),
    ("BLE device is receiving service discovery request", Some(20)),
    ("BLE device is transmitting service discovery response", Some(21)),
    ("BLE device is transmitting heart rate measurement notification", Some(22)),
];

fn generate_session(repeats: usize) -> (String, PacketLengthIndex) {
    let mut text = String::new();
    let mut index = PacketLengthIndex::new();
    let mut time = 0;
    let mut sequence = 1;
    for _ in 0..repeats {
        for (phrase, length) in SESSION {
            text.push_str(&format!("Time {}s: {}\n", time, phrase));
            if let Some(length) = length {
                index.insert(CapturedPacket::new(sequence, *length));
                sequence += 1;
            }
            time += 1;
        }
        time += 10;
    }
    (text, index)
}

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    let (text, _) = generate_session(1250);

    group.throughput(Throughput::Elements((1250 * SESSION.len()) as u64));
    group.bench_function("parse_10000_lines", |b| {
        b.iter(|| {
            let log = EventLog::parse(black_box(&text), TimeFormat::Integer).unwrap();
            black_box(log);
        })
    });

    group.finish();
}

fn bench_scenarios(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios");
    let (text, index) = generate_session(1250);
    let log = EventLog::parse(&text, TimeFormat::Integer).unwrap();

    group.throughput(Throughput::Elements(log.len() as u64));
    for scenario in Scenario::ALL {
        let engine = PowerEngine::for_scenario(scenario);
        group.bench_function(scenario.as_str(), |b| {
            b.iter(|| black_box(engine.run(black_box(&log), &index)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parsing, bench_scenarios);
criterion_main!(benches);
