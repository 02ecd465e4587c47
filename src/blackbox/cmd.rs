// [[file:../../otf.note::*imports][imports:1]]
use super::*;
// imports:1 ends here

// [[file:../../otf.note::50a738a3][50a738a3]]
impl BlackBoxModel {
    /// Call run script with `text` as its standard input (stdin), and wait
    /// for process output (stdout)
    pub(super) fn submit_cmd(&mut self, text: &str) -> Result<String> {
        let run_file = self.prepare_compute_env()?;

        let tpl_dir = self
            .tpl_file
            .parent()
            .ok_or_else(|| format_err!("bbm_tpl_file: invalid path: {:?}", self.tpl_file))?;
        trace!("BBM_TPL_DIR: {:?}", tpl_dir);
        trace!("BBM_JOB_DIR: {:?}", self.job_dir);

        let wrk_dir = run_file
            .parent()
            .ok_or_else(|| format_err!("invalid run script path: {:?}", run_file))?;
        debug!("submit cmdline: {}", run_file.display());

        // a non-zero exit status is reported as an error by duct
        let output = duct::cmd!(&run_file)
            .dir(wrk_dir)
            .env("BBM_TPL_DIR", tpl_dir)
            .env("BBM_JOB_DIR", &self.job_dir)
            .stdin_bytes(text)
            .stdout_capture()
            .run()
            .with_context(|| format!("Failed to run script: {:?}", run_file))?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
// 50a738a3 ends here
