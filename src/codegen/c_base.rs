/// Static C preludes spliced into every generated translation unit. The
/// backend treats both as opaque text; the only contract is that they define
/// `PUFFS_VERSION`, `PUFFS_LOW_BITS`, and the `puffs_base_buf1` /
/// `puffs_base_buf2` types the generated code mentions.
pub const BASE_HEADER: &str = r#"#ifndef PUFFS_BASE_HEADER_H
#define PUFFS_BASE_HEADER_H

#include <stdbool.h>
#include <stdint.h>
#include <string.h>

// PUFFS_VERSION is the major.minor version number as a uint32_t. The major
// number is the high 16 bits. The minor number is the low 16 bits.
#define PUFFS_VERSION (0x00001)

// PUFFS_LOW_BITS returns the low n bits of x, where n is in the range
// [0, 31].
#define PUFFS_LOW_BITS(x, n) ((x) & ((1 << (n)) - 1))

// puffs_base_buf1 is a 1-dimensional buffer (a pointer and length) plus
// additional indexes into that buffer.
//
// A value is typically passed as a (pointer to a) puffs_base_buf1, to
// channel mutations back to the caller.
typedef struct {
  uint8_t* ptr;  // Pointer.
  size_t len;    // Length.
  size_t wi;     // Write index. Invariant: wi <= len.
  size_t ri;     // Read index. Invariant: ri <= wi.
  bool closed;   // No further writes are expected.
} puffs_base_buf1;

// puffs_base_buf2 is a 2-dimensional buffer, typically a pixel buffer: the
// fields of a puffs_base_buf1 plus a width, height and stride.
typedef struct {
  uint8_t* ptr;  // Pointer.
  size_t len;    // Length.
  size_t wi;     // Write index. Invariant: wi <= len.
  size_t ri;     // Read index. Invariant: ri <= wi.
  bool closed;   // No further writes are expected.
  uint32_t width;
  uint32_t height;
  uint32_t stride;
} puffs_base_buf2;

#endif  // PUFFS_BASE_HEADER_H
"#;

pub const BASE_IMPL: &str = r#"// The base implementation prelude is reserved for helper routines shared by
// every generated package. The generated code currently only relies on the
// <string.h> routines included by the base header.
"#;
