/// Execution classes used to tag spawned work in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Async orchestration of a processing job.
	Background,
	/// CPU-bound transformation run on the blocking pool.
	CpuBlocking,
	/// Long-lived interval loops.
	Periodic,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Background => "background",
			Self::CpuBlocking => "cpu_blocking",
			Self::Periodic => "periodic",
		}
	}
}
