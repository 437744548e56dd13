//! Benchmarks for IRC message parsing, formatting, and stream framing.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use slirc_client::{LineCodec, Message};
use tokio_util::codec::Decoder;

/// Simple PING message
const SIMPLE_MESSAGE: &str = "PING :irc.example.com";

/// Message with prefix
const PREFIX_MESSAGE: &str = ":nick!user@host PRIVMSG #channel :Hello, world!";

/// Message with IRCv3 tags
const TAGGED_MESSAGE: &str = "@time=2023-01-01T00:00:00.000Z;msgid=abc123;+example/tag=value :nick!user@host PRIVMSG #channel :Hello with tags!";

/// Complex message with escaped tags
const COMPLEX_TAGS: &str = "@time=2023-01-01T12:00:00Z;msgid=msg-12345;+draft/reply=parent-id;batch=batch001;account=user\\sname :nick!user@host.example.com PRIVMSG #long-channel-name :This is a longer message with more content to parse";

/// Numeric response
const NUMERIC_RESPONSE: &str = ":irc.server.net 005 nickname CHANTYPES=# EXCEPTS INVEX NICKLEN=30 NETWORK=Example :are supported by this server";

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Parsing");

    for (name, line) in [
        ("simple_ping", SIMPLE_MESSAGE),
        ("with_prefix", PREFIX_MESSAGE),
        ("with_tags", TAGGED_MESSAGE),
        ("complex_tags", COMPLEX_TAGS),
        ("numeric_response", NUMERIC_RESPONSE),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| {
                let msg: Message = black_box(line).parse().unwrap();
                black_box(msg)
            })
        });
    }

    group.finish();
}

fn benchmark_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Formatting");
    let tagged: Message = COMPLEX_TAGS.parse().unwrap();
    let plain = Message::privmsg("#channel", "Hello, world!");

    group.bench_function("privmsg_wire", |b| {
        b.iter(|| black_box(&plain).to_wire(false, 512))
    });

    group.bench_function("tagged_wire", |b| {
        b.iter(|| black_box(&tagged).to_wire(true, 512))
    });

    for len in [100usize, 1000, 4000] {
        let long = Message::privmsg("#channel", "é".repeat(len));
        group.bench_with_input(BenchmarkId::new("truncated_wire", len), &long, |b, msg| {
            b.iter(|| black_box(msg).to_wire(false, 512))
        });
    }

    group.finish();
}

fn benchmark_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Line Framing");
    let stream: String = [SIMPLE_MESSAGE, PREFIX_MESSAGE, TAGGED_MESSAGE, NUMERIC_RESPONSE]
        .iter()
        .cycle()
        .take(200)
        .map(|line| format!("{}\r\n", line))
        .collect();
    group.throughput(Throughput::Bytes(stream.len() as u64));

    group.bench_function("decode_200_lines", |b| {
        b.iter(|| {
            let mut codec = LineCodec::new();
            let mut buf = BytesMut::from(stream.as_bytes());
            let mut count = 0;
            while let Some(line) = codec.decode(&mut buf).unwrap() {
                black_box(line);
                count += 1;
            }
            count
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_parsing,
    benchmark_formatting,
    benchmark_framing
);
criterion_main!(benches);
