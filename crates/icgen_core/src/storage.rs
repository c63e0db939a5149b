use crate::error::{Error, Result};
use nalgebra::Vector3;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sink for initial condition data, one time step at a time.
///
/// An initial condition can optionally contain velocities and describe
/// multiple times. The object count and the presence of velocities are
/// fixed by the first step; any later deviation is a shape mismatch.
/// Step order is call order. `close` writes trailing metadata (the time
/// index) and must run even when the producing pipeline fails.
pub trait OutputSink {
    fn write_step(
        &mut self,
        positions: &[Vector3<f64>],
        velocities: Option<&[Vector3<f64>]>,
        time: f64,
    ) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Shared shape validation for all sink implementations. The two original
/// writers each carried their own partial copy of these checks; one guard
/// keeps them consistent.
#[derive(Debug, Default)]
struct ShapeGuard {
    object_count: Option<usize>,
    has_velocities: Option<bool>,
}

impl ShapeGuard {
    fn check(
        &mut self,
        positions: &[Vector3<f64>],
        velocities: Option<&[Vector3<f64>]>,
    ) -> Result<()> {
        if let Some(v) = velocities {
            if v.len() != positions.len() {
                return Err(Error::ShapeMismatch(format!(
                    "positions and velocities should have the same length \
                     ({} vs {})",
                    positions.len(),
                    v.len()
                )));
            }
        }
        if let Some(expected) = self.object_count {
            if expected != positions.len() {
                return Err(Error::ShapeMismatch(format!(
                    "number of objects can't change between time steps \
                     (was {expected}, got {})",
                    positions.len()
                )));
            }
        }
        if let Some(had) = self.has_velocities {
            if had != velocities.is_some() {
                return Err(Error::ShapeMismatch(
                    "either all or none of the time steps must have velocities".into(),
                ));
            }
        }
        self.object_count = Some(positions.len());
        self.has_velocities = Some(velocities.is_some());
        Ok(())
    }
}

/// Writes one ASCII VTK XML unstructured grid file (.vtu) per time step and
/// a ParaView collection file (.pvd) indexing them by time on close.
pub struct VtuSink {
    stem: PathBuf,
    expected_steps: usize,
    times: Vec<f64>,
    guard: ShapeGuard,
    closed: bool,
}

impl VtuSink {
    /// `stem` is the output path without extension; step files are written
    /// as `<stem>_<index>.vtu` next to the final `<stem>.pvd`.
    pub fn create(stem: impl Into<PathBuf>, expected_steps: usize) -> Self {
        Self {
            stem: stem.into(),
            expected_steps,
            times: Vec::new(),
            guard: ShapeGuard::default(),
            closed: false,
        }
    }

    fn step_file_name(&self, index: usize) -> String {
        let base = self
            .stem
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        format!("{base}_{index:04}.vtu")
    }

    fn step_path(&self, index: usize) -> PathBuf {
        self.stem
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(self.step_file_name(index))
    }
}

fn write_vector_array(out: &mut impl Write, name: Option<&str>, data: &[Vector3<f64>]) -> Result<()> {
    match name {
        Some(name) => writeln!(
            out,
            "        <DataArray type=\"Float64\" Name=\"{name}\" NumberOfComponents=\"3\" format=\"ascii\">"
        )?,
        None => writeln!(
            out,
            "        <DataArray type=\"Float64\" NumberOfComponents=\"3\" format=\"ascii\">"
        )?,
    }
    for v in data {
        writeln!(out, "          {} {} {}", v.x, v.y, v.z)?;
    }
    writeln!(out, "        </DataArray>")?;
    Ok(())
}

impl OutputSink for VtuSink {
    fn write_step(
        &mut self,
        positions: &[Vector3<f64>],
        velocities: Option<&[Vector3<f64>]>,
        time: f64,
    ) -> Result<()> {
        self.guard.check(positions, velocities)?;

        let path = self.step_path(self.times.len());
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "<?xml version=\"1.0\"?>")?;
        writeln!(
            out,
            "<VTKFile type=\"UnstructuredGrid\" version=\"0.1\" byte_order=\"LittleEndian\">"
        )?;
        writeln!(out, "  <UnstructuredGrid>")?;
        writeln!(
            out,
            "    <Piece NumberOfPoints=\"{}\" NumberOfCells=\"0\">",
            positions.len()
        )?;
        writeln!(out, "      <Points>")?;
        write_vector_array(&mut out, None, positions)?;
        writeln!(out, "      </Points>")?;
        if let Some(velocities) = velocities {
            writeln!(out, "      <PointData>")?;
            write_vector_array(&mut out, Some("Velocity"), velocities)?;
            writeln!(out, "      </PointData>")?;
        }
        // A point cloud has no cells, but the arrays must still be present.
        writeln!(out, "      <Cells>")?;
        for name in ["connectivity", "offsets"] {
            writeln!(
                out,
                "        <DataArray type=\"Int64\" Name=\"{name}\" format=\"ascii\">"
            )?;
            writeln!(out, "        </DataArray>")?;
        }
        writeln!(
            out,
            "        <DataArray type=\"UInt8\" Name=\"types\" format=\"ascii\">"
        )?;
        writeln!(out, "        </DataArray>")?;
        writeln!(out, "      </Cells>")?;
        writeln!(out, "    </Piece>")?;
        writeln!(out, "  </UnstructuredGrid>")?;
        writeln!(out, "</VTKFile>")?;
        out.flush()?;

        self.times.push(time);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.times.len() != self.expected_steps {
            log::warn!(
                "closing VTU output after {} of {} expected time steps",
                self.times.len(),
                self.expected_steps
            );
        }

        let mut out = BufWriter::new(File::create(self.stem.with_extension("pvd"))?);
        writeln!(out, "<?xml version=\"1.0\"?>")?;
        writeln!(
            out,
            "<VTKFile type=\"Collection\" version=\"0.1\" byte_order=\"LittleEndian\">"
        )?;
        writeln!(out, "  <Collection>")?;
        for (index, time) in self.times.iter().enumerate() {
            writeln!(
                out,
                "    <DataSet timestep=\"{time}\" group=\"\" part=\"0\" file=\"{}\"/>",
                self.step_file_name(index)
            )?;
        }
        writeln!(out, "  </Collection>")?;
        writeln!(out, "</VTKFile>")?;
        out.flush()?;
        Ok(())
    }
}

impl Drop for VtuSink {
    fn drop(&mut self) {
        // Last resort; callers should close explicitly to see errors.
        let _ = self.close();
    }
}

#[derive(Debug, Serialize)]
struct JsonStep {
    time: f64,
    positions: Vec<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    velocities: Option<Vec<[f64; 3]>>,
}

#[derive(Debug, Serialize)]
struct JsonDocument<'a> {
    steps: &'a [JsonStep],
}

/// Buffers all time steps and serializes them as a single JSON document on
/// close.
pub struct JsonSink {
    path: PathBuf,
    expected_steps: usize,
    steps: Vec<JsonStep>,
    guard: ShapeGuard,
    closed: bool,
}

impl JsonSink {
    pub fn create(path: impl Into<PathBuf>, expected_steps: usize) -> Self {
        Self {
            path: path.into(),
            expected_steps,
            steps: Vec::new(),
            guard: ShapeGuard::default(),
            closed: false,
        }
    }
}

impl OutputSink for JsonSink {
    fn write_step(
        &mut self,
        positions: &[Vector3<f64>],
        velocities: Option<&[Vector3<f64>]>,
        time: f64,
    ) -> Result<()> {
        self.guard.check(positions, velocities)?;
        self.steps.push(JsonStep {
            time,
            positions: positions.iter().map(|v| [v.x, v.y, v.z]).collect(),
            velocities: velocities.map(|vs| vs.iter().map(|v| [v.x, v.y, v.z]).collect()),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.steps.len() != self.expected_steps {
            log::warn!(
                "closing JSON output after {} of {} expected time steps",
                self.steps.len(),
                self.expected_steps
            );
        }

        let out = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(out, &JsonDocument { steps: &self.steps })?;
        Ok(())
    }
}

impl Drop for JsonSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
