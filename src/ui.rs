//! Browser page. Renders the snapshot it is handed and posts intents back;
//! it keeps no state of its own.

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Hand Analyzer</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #0f172a;
            color: #e2e8f0;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }

        .container {
            background: #1e293b;
            border-radius: 16px;
            max-width: 720px;
            width: 100%;
            padding: 32px;
        }

        h1 { font-size: 1.8em; margin-bottom: 6px; }
        .subtitle { color: #94a3b8; margin-bottom: 24px; font-size: 0.9em; }

        .drop {
            border: 2px dashed #38bdf8;
            border-radius: 12px;
            padding: 48px 16px;
            text-align: center;
            cursor: pointer;
        }
        .drop.dragover { background: #0c4a6e; }
        input[type="file"] { display: none; }

        .preview { max-width: 100%; border-radius: 10px; margin-bottom: 16px; }
        .panel { margin-top: 16px; padding: 16px; border-radius: 10px; background: #0f172a; white-space: pre-wrap; line-height: 1.6; }
        .panel.error { border: 1px solid #f87171; color: #fca5a5; }
        .actions { display: flex; gap: 10px; margin-top: 16px; }
        button { padding: 10px 18px; border: none; border-radius: 8px; font-weight: 600; cursor: pointer; }
        .primary { background: #38bdf8; color: #0f172a; }
        .secondary { background: #334155; color: #e2e8f0; }
        .hidden { display: none; }
    </style>
</head>
<body>
    <div class="container">
        <h1>Hand Analyzer</h1>
        <p class="subtitle">Upload a photo of a hand to count fingers and describe the gesture.</p>

        <div class="drop" id="drop">
            <p>Click or drag an image here</p>
            <input type="file" id="fileInput" accept="image/*">
        </div>

        <div id="workspace" class="hidden">
            <img id="preview" class="preview" alt="Selected image">
            <div id="loading" class="panel hidden">Analyzing…</div>
            <div id="result" class="panel hidden"></div>
            <div id="error" class="panel error hidden"></div>
            <div class="actions">
                <button id="analyze" class="primary">Analyze</button>
                <button id="retry" class="primary hidden">Retry</button>
                <button id="reset" class="secondary">Reset</button>
            </div>
        </div>
    </div>

    <script>
        const $ = (id) => document.getElementById(id);
        let polling = null;

        function show(id, visible) { $(id).classList.toggle('hidden', !visible); }

        function render(s) {
            show('drop', s.status === 'empty');
            show('workspace', s.status !== 'empty');
            if (s.image) { $('preview').src = s.image.data_uri; }
            show('loading', s.status === 'loading');
            show('result', s.status === 'success');
            show('error', s.status === 'error');
            show('analyze', s.status === 'ready' || s.status === 'success');
            show('retry', s.status === 'error');
            $('analyze').disabled = s.status === 'loading';
            $('result').textContent = s.result || '';
            $('error').textContent = s.error || '';

            if (s.status === 'loading' && !polling) {
                polling = setInterval(poll, 500);
            } else if (s.status !== 'loading' && polling) {
                clearInterval(polling);
                polling = null;
            }
        }

        async function call(path, options) {
            const response = await fetch(path, options);
            const body = await response.json();
            if (response.ok) { render(body); } else { await refresh(); }
        }

        const refresh = () => call('/api/state');
        const poll = () => call('/api/state?lite=true');
        const intent = (name) => call('/api/' + name, { method: 'POST' });

        function upload(file) {
            const form = new FormData();
            if (file) { form.append('file', file); }
            call('/api/upload', { method: 'POST', body: form });
        }

        $('drop').addEventListener('click', () => $('fileInput').click());
        $('drop').addEventListener('dragover', (e) => { e.preventDefault(); $('drop').classList.add('dragover'); });
        $('drop').addEventListener('dragleave', () => $('drop').classList.remove('dragover'));
        $('drop').addEventListener('drop', (e) => {
            e.preventDefault();
            $('drop').classList.remove('dragover');
            upload(e.dataTransfer.files[0]);
        });
        $('fileInput').addEventListener('change', (e) => {
            upload(e.target.files[0]);
            e.target.value = '';
        });
        $('analyze').addEventListener('click', () => intent('analyze'));
        $('retry').addEventListener('click', () => intent('retry'));
        $('reset').addEventListener('click', () => intent('reset'));

        refresh();
    </script>
</body>
</html>
"#;
