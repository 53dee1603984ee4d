//! STL import and export
use super::Mesh;
use crate::Error;
use nalgebra::Vector3;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};

const HEADER: &[u8] = b"This is a binary STL file exported by meshsdf";
static_assertions::const_assert!(HEADER.len() <= 80);

/// Size of one binary STL triangle record: normal, 3 vertices, attributes
const RECORD_SIZE: usize = 12 * std::mem::size_of::<f32>() + 2;

impl Mesh {
    /// Writes a binary STL to the given output
    pub fn write_stl<F: std::io::Write>(
        &self,
        out: &mut F,
    ) -> Result<(), crate::Error> {
        // We're going to do many small writes and will typically be writing to
        // a file, so using a `BufWriter` saves excessive syscalls.
        let mut out = BufWriter::new(out);
        out.write_all(HEADER)?;
        out.write_all(&[0u8; 80 - HEADER.len()])?;
        out.write_all(&(self.triangles.len() as u32).to_le_bytes())?;
        for t in &self.triangles {
            let a = self.vertices[t.x];
            let b = self.vertices[t.y];
            let c = self.vertices[t.z];
            let normal = (b - a)
                .cross(&(c - a))
                .try_normalize(0.0)
                .unwrap_or_else(Vector3::zeros);
            for p in &normal {
                out.write_all(&p.to_le_bytes())?;
            }
            for v in t {
                for p in &self.vertices[*v] {
                    out.write_all(&p.to_le_bytes())?;
                }
            }
            out.write_all(&[0u8; std::mem::size_of::<u16>()])?; // attributes
        }
        out.flush()?;
        Ok(())
    }

    /// Reads a binary or ASCII STL file
    ///
    /// Identical vertex positions are merged, so the resulting mesh has
    /// shared-vertex connectivity.  Stored normals are ignored; winding
    /// order determines the triangle orientation.
    pub fn read_stl<R: Read>(input: R) -> Result<Self, Error> {
        let mut data = vec![];
        BufReader::new(input).read_to_end(&mut data)?;

        // ASCII files start with "solid", but so do some binary files; the
        // binary triangle count is a more reliable test.
        let binary = data.len() >= 84 && {
            let n = triangle_count(&data);
            data.len() == 84 + n as usize * RECORD_SIZE
        };
        if binary || !data.trim_ascii_start().starts_with(b"solid") {
            Self::parse_binary(&data)
        } else {
            Self::parse_ascii(&data)
        }
    }

    fn parse_binary(data: &[u8]) -> Result<Self, Error> {
        if data.len() < 84 {
            return Err(std::io::Error::from(
                std::io::ErrorKind::UnexpectedEof,
            )
            .into());
        }
        let n = triangle_count(data);
        let records = &data[84..];
        if records.len() < n as usize * RECORD_SIZE {
            return Err(std::io::Error::from(
                std::io::ErrorKind::UnexpectedEof,
            )
            .into());
        }

        let mut builder = MeshBuilder::default();
        for record in records.chunks_exact(RECORD_SIZE).take(n as usize) {
            let f = |i: usize| {
                let o = 12 + i * 4;
                f32::from_le_bytes([
                    record[o],
                    record[o + 1],
                    record[o + 2],
                    record[o + 3],
                ])
            };
            let v = |j: usize| {
                Vector3::new(f(j * 3), f(j * 3 + 1), f(j * 3 + 2))
            };
            builder.push([v(0), v(1), v(2)]);
        }
        Ok(builder.out)
    }

    fn parse_ascii(data: &[u8]) -> Result<Self, Error> {
        let mut builder = MeshBuilder::default();
        let mut facet = vec![];
        for (i, line) in data.lines().enumerate() {
            let line = line?;
            let mut words = line.split_whitespace();
            match words.next() {
                Some("vertex") => {
                    let mut coord = || -> Result<f32, Error> {
                        words
                            .next()
                            .ok_or_else(|| stl_error(i, "missing coordinate"))?
                            .parse()
                            .map_err(|e| stl_error(i, e))
                    };
                    facet.push(Vector3::new(coord()?, coord()?, coord()?));
                }
                Some("endfacet") => {
                    let [a, b, c] = facet[..] else {
                        return Err(stl_error(
                            i,
                            format!("facet has {} vertices", facet.len()),
                        ));
                    };
                    builder.push([a, b, c]);
                    facet.clear();
                }
                _ => (),
            }
        }
        Ok(builder.out)
    }
}

/// Reads the triangle count from a binary STL header
fn triangle_count(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[80], data[81], data[82], data[83]])
}

fn stl_error(line: usize, reason: impl ToString) -> Error {
    Error::StlParse {
        line: line + 1,
        reason: reason.to_string(),
    }
}

/// Accumulates triangles, merging identical vertex positions
#[derive(Default)]
struct MeshBuilder {
    map: HashMap<[u32; 3], usize>,
    out: Mesh,
}

impl MeshBuilder {
    fn push(&mut self, tri: [Vector3<f32>; 3]) {
        let [a, b, c] = tri.map(|v| {
            let key = [v.x, v.y, v.z].map(|c| (c + 0.0).to_bits());
            *self.map.entry(key).or_insert_with(|| {
                self.out.vertices.push(v);
                self.out.vertices.len() - 1
            })
        });
        self.out.triangles.push(Vector3::new(a, b, c));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::shapes;

    #[test]
    fn binary_roundtrip_merges_vertices() {
        let cube = shapes::cube(1.0);
        let mut buf = vec![];
        cube.write_stl(&mut buf).unwrap();
        assert_eq!(buf.len(), 84 + 12 * RECORD_SIZE);

        let out = Mesh::read_stl(buf.as_slice()).unwrap();
        assert_eq!(out.triangles.len(), 12);
        assert_eq!(out.vertices.len(), 8);
        for (a, b) in cube.triangles.iter().zip(&out.triangles) {
            for i in 0..3 {
                assert_eq!(cube.vertices[a[i]], out.vertices[b[i]]);
            }
        }
    }

    #[test]
    fn ascii() {
        const TEXT: &str = "solid tri
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
  facet normal 0 0 -1
    outer loop
      vertex 0 0 0
      vertex 0 1 0
      vertex 1 0 0
    endloop
  endfacet
endsolid tri
";
        let mesh = Mesh::read_stl(TEXT.as_bytes()).unwrap();
        assert_eq!(mesh.triangles.len(), 2);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.triangles[1], Vector3::new(0, 2, 1));

        // The first "vertex 1 0 0" is on line 5
        let bad = TEXT.replacen("vertex 1 0 0", "vertex 1 x 0", 1);
        let err = Mesh::read_stl(bad.as_bytes()).err();
        assert!(matches!(err, Some(Error::StlParse { line: 5, .. })));
    }
}
