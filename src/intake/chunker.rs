//! Fixed-size overlapping text chunking for ingested page content.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: Uuid,
    pub text: String,
    pub index: usize,
}

pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    min_chunk_size: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize, min_chunk_size: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            min_chunk_size,
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.len() <= self.chunk_size {
            if text.len() < self.min_chunk_size {
                return Vec::new();
            }
            return vec![Chunk {
                id: Uuid::new_v4(),
                text: text.to_string(),
                index: 0,
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut index = 0;

        while start < text.len() {
            let raw_end = (start + self.chunk_size).min(text.len());
            let end = snap_to_char_boundary(text, raw_end);

            let actual_end = if end < text.len() {
                self.find_break_point(text, start, end)
            } else {
                end
            };

            let chunk_text = &text[start..actual_end];
            if chunk_text.len() >= self.min_chunk_size {
                chunks.push(Chunk {
                    id: Uuid::new_v4(),
                    text: chunk_text.to_string(),
                    index,
                });
                index += 1;
            }

            let step = if actual_end - start > self.chunk_overlap {
                actual_end - start - self.chunk_overlap
            } else {
                actual_end - start
            };
            start = snap_to_char_boundary(text, start + step.max(1));
        }

        chunks
    }

    /// Prefer to break on a sentence end, then on whitespace, within the
    /// trailing quarter of the window.
    fn find_break_point(&self, text: &str, start: usize, end: usize) -> usize {
        let window = &text[start..end];
        let search_from = window.len().saturating_sub(self.chunk_size / 4);

        for (offset, c) in window.char_indices().rev() {
            if offset < search_from {
                break;
            }
            if matches!(c, '.' | '!' | '?' | '\n') {
                return start + offset + c.len_utf8();
            }
        }
        for (offset, c) in window.char_indices().rev() {
            if offset < search_from {
                break;
            }
            if c.is_whitespace() {
                return start + offset + c.len_utf8();
            }
        }
        end
    }
}

fn snap_to_char_boundary(text: &str, mut pos: usize) -> usize {
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos.min(text.len())
}
