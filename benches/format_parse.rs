use bitform::{BitStream, FormatNode, MemoryStream, StructField};
use criterion::{Criterion, criterion_group, criterion_main};

fn gen_format(field_count: usize) -> FormatNode {
    let mut fields = Vec::with_capacity(field_count);

    for i in 0..field_count {
        // Alternate narrow and word-spanning widths.
        let width: usize = if i % 2 == 0 { 3 } else { 13 };
        fields.push(StructField::new(format!("f{}", i), FormatNode::integer(width)));
    }

    FormatNode::structure(fields)
}

fn gen_packet(total_bits: usize) -> Vec<u8> {
    let total_bytes = total_bits.div_ceil(8);
    let mut data = Vec::with_capacity(total_bytes);

    for i in 0..total_bytes {
        data.push((i * 31 % 256) as u8);
    }

    data
}

fn bench_struct_parse(c: &mut Criterion) {
    for &field_count in &[1usize, 10, 50, 100] {
        let format = gen_format(field_count);
        let packet = gen_packet(field_count * 13);

        c.bench_function(&format!("parse_{}_fields", field_count), |b| {
            b.iter(|| {
                let _ = format.parse_bytes(&packet).unwrap();
            })
        });
    }
}

fn bench_bit_reads(c: &mut Criterion) {
    let packet = gen_packet(64 * 1024);

    for &width in &[1usize, 7, 32, 64] {
        c.bench_function(&format!("read_bits_{}", width), |b| {
            b.iter(|| {
                let mut stream = BitStream::new(MemoryStream::from_bytes(packet.as_slice()));
                let mut sum = 0u64;
                while let Ok(bits) = stream.read_bits(width) {
                    sum = sum.wrapping_add(bits);
                }
                sum
            })
        });
    }
}

fn bench_wide_integer(c: &mut Criterion) {
    let format = FormatNode::array(64usize, FormatNode::integer(100usize));
    let packet = gen_packet(64 * 100);

    c.bench_function("parse_64_wide_integers", |b| {
        b.iter(|| {
            let _ = format.parse_bytes(&packet).unwrap();
        })
    });
}

criterion_group!(benches, bench_struct_parse, bench_bit_reads, bench_wide_integer);
criterion_main!(benches);
