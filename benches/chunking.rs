use criterion::{Criterion, criterion_group, criterion_main};
use rag_chat::ingest::{ChunkingConfig, Document, split_documents};
use std::hint::black_box;

fn sample_document() -> Document {
    let paragraph = "Retrieval-augmented generation pairs a language model with a search \
        index. Documents are split into overlapping chunks, embedded, and stored so that \
        the most relevant passages can be handed to the model as context.\n";
    let text = (0..400)
        .map(|i| {
            if i % 5 == 4 {
                format!("{paragraph}\n")
            } else {
                paragraph.to_string()
            }
        })
        .collect::<String>();
    Document::new(text, "bench.txt")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let documents = vec![sample_document()];

    let config = ChunkingConfig::default();
    c.bench_function("split_documents", |b| {
        b.iter(|| split_documents(black_box(&documents), black_box(&config)))
    });

    let small = ChunkingConfig::new(120, 10);
    c.bench_function("split_documents_small_chunks", |b| {
        b.iter(|| split_documents(black_box(&documents), black_box(&small)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
